//! Incremental terminal rendering of a relayed stream
//!
//! Thinking is rendered dimmed, the answer plain. Events carry full buffer
//! values, so the printer tracks how much of each buffer is already on
//! screen and emits only the suffix.

use crate::types::StreamEvent;
use colored::Colorize;
use std::io::Write;

/// Renders stream events as they arrive
#[derive(Debug, Default)]
pub struct StreamPrinter {
    think_printed: usize,
    response_printed: usize,
    in_think: bool,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Think { content } => self.render_think(content),
            StreamEvent::Response { content } => self.render_response(content),
        }
        let _ = std::io::stdout().flush();
    }

    fn render_think(&mut self, content: &str) {
        if !self.in_think {
            print!("{}", "· thinking: ".dimmed());
            self.in_think = true;
            self.think_printed = 0;
        }
        if content.len() >= self.think_printed
            && content.is_char_boundary(self.think_printed)
        {
            print!("{}", content[self.think_printed..].dimmed());
        } else {
            // Buffer was replaced with unrelated text; start a fresh line.
            println!();
            print!("{}{}", "· thinking: ".dimmed(), content.dimmed());
        }
        self.think_printed = content.len();
    }

    fn render_response(&mut self, content: &str) {
        if self.in_think {
            println!();
            self.in_think = false;
        }
        if content.len() >= self.response_printed
            && content.is_char_boundary(self.response_printed)
        {
            print!("{}", &content[self.response_printed..]);
        } else {
            println!();
            print!("{content}");
        }
        self.response_printed = content.len();
    }

    /// End the turn with a newline
    pub fn finish(&mut self) {
        println!();
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_tracks_printed_lengths() {
        let mut printer = StreamPrinter::new();
        printer.render(&StreamEvent::Response {
            content: "Hello".to_string(),
        });
        assert_eq!(printer.response_printed, 5);
        printer.render(&StreamEvent::Response {
            content: "Hello, world".to_string(),
        });
        assert_eq!(printer.response_printed, 12);
    }

    #[test]
    fn test_think_then_response_transitions() {
        let mut printer = StreamPrinter::new();
        printer.render(&StreamEvent::Think {
            content: "weighing".to_string(),
        });
        assert!(printer.in_think);
        printer.render(&StreamEvent::Response {
            content: "answer".to_string(),
        });
        assert!(!printer.in_think);
    }

    #[test]
    fn test_think_replacement_resets_cleanly() {
        let mut printer = StreamPrinter::new();
        printer.render(&StreamEvent::Think {
            content: "a long first thought".to_string(),
        });
        // Shorter replacement, as the overwrite semantics allow.
        printer.render(&StreamEvent::Think {
            content: "short".to_string(),
        });
        assert_eq!(printer.think_printed, 5);
    }
}
