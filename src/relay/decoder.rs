//! Incremental UTF-8 line decoder for streamed event protocols
//!
//! Upstream chunk boundaries are arbitrary: a read may end in the middle of
//! a multi-byte character or in the middle of a line. Trailing bytes that do
//! not yet decode are buffered until more data arrives, never dropped.

/// Stateful decoder turning a chunked byte stream into complete lines
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes that did not yet form a complete UTF-8 sequence
    pending: Vec<u8>,

    /// Text of the line currently being assembled
    partial_line: String,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line completed by it
    ///
    /// Line terminators (`\n`, with an optional preceding `\r`) are
    /// stripped. Invalid byte sequences decode to U+FFFD rather than
    /// aborting the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.partial_line.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // Safety of unwrap: the prefix was just validated.
                    self.partial_line
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap());
                    match err.error_len() {
                        Some(bad) => {
                            self.partial_line.push('\u{FFFD}');
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete trailing character: keep for the next chunk.
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        let mut lines = Vec::new();
        while let Some(idx) = self.partial_line.find('\n') {
            let rest = self.partial_line.split_off(idx + 1);
            let mut line = std::mem::replace(&mut self.partial_line, rest);
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush the final unterminated line, if any
    pub fn take_remainder(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.partial_line
                .push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        if self.partial_line.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial_line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(b"data: hello\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"data: hel").is_empty());
        assert_eq!(decoder.push(b"lo\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(b"a\nb\nc\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        let text = "data: 你好\n".as_bytes();
        // Cut inside the three-byte encoding of 你.
        assert!(decoder.push(&text[..8]).is_empty());
        assert_eq!(decoder.push(&text[8..]), vec!["data: 你好"]);
    }

    #[test]
    fn test_every_byte_its_own_chunk() {
        let mut decoder = StreamDecoder::new();
        let text = "data: é→😀\ndata: two\n".as_bytes();
        let mut lines = Vec::new();
        for byte in text {
            lines.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["data: é→😀", "data: two"]);
    }

    #[test]
    fn test_crlf_terminator_stripped() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(b"data: x\r\n"), vec!["data: x"]);
    }

    #[test]
    fn test_invalid_bytes_become_replacement_char() {
        let mut decoder = StreamDecoder::new();
        let lines = decoder.push(b"a\xFFb\n");
        assert_eq!(lines, vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_take_remainder() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.push(b"no newline").is_empty());
        assert_eq!(decoder.take_remainder().as_deref(), Some("no newline"));
        assert!(decoder.take_remainder().is_none());
    }
}
