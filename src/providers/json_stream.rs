//! Incremental JSON object scanner for streamed provider responses
//!
//! Ollama streams newline-delimited JSON objects, but transport chunking is
//! arbitrary: an object may arrive split across reads. A single-pass
//! bracket-matching scan extracts each complete top-level object as soon as
//! its closing brace arrives, leaving partial data buffered.

use crate::errors::{AppError, Result};

/// Maximum accumulation buffer (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Accumulates bytes and yields complete top-level JSON objects
#[derive(Debug)]
pub struct JsonObjectStream {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl JsonObjectStream {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and extract every object completed by them, in order
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(AppError::StreamRead(format!(
                "provider chunk buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }
        self.buffer.extend_from_slice(bytes);

        let mut objects = Vec::new();
        while let Some((start, end)) = self.find_complete_object()? {
            let object = String::from_utf8_lossy(&self.buffer[start..=end]).to_string();
            self.buffer.drain(..=end);
            objects.push(object);
        }
        Ok(objects)
    }

    /// Single-pass bracket matching, ignoring braces inside string literals
    fn find_complete_object(&self) -> Result<Option<(usize, usize)>> {
        let mut depth = 0i32;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            return Ok(Some((s, i)));
                        }
                    }
                    if depth < 0 {
                        return Err(AppError::StreamRead(
                            "mismatched braces in provider stream".to_string(),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for JsonObjectStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_object_in_one_chunk() {
        let mut scanner = JsonObjectStream::new();
        let objects = scanner
            .push(br#"{"message":{"content":"hi"},"done":false}"#)
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].contains("\"hi\""));
        assert!(scanner.is_empty());
    }

    #[test]
    fn test_object_split_across_chunks() {
        let mut scanner = JsonObjectStream::new();
        assert!(scanner.push(br#"{"message":{"con"#).unwrap().is_empty());
        let objects = scanner.push(br#"tent":"x"},"done":false}"#).unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_multiple_objects_in_one_chunk() {
        let mut scanner = JsonObjectStream::new();
        let objects = scanner
            .push(b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}")
            .unwrap();
        assert_eq!(objects, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let mut scanner = JsonObjectStream::new();
        let objects = scanner
            .push(br#"{"content":"code: fn main() { }"}"#)
            .unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let mut scanner = JsonObjectStream::new();
        let objects = scanner.push(br#"{"content":"say \"hi\" {now}"}"#).unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_buffer_overflow_errors() {
        let mut scanner = JsonObjectStream::with_capacity(16);
        let err = scanner.push(&vec![b'a'; 32]).unwrap_err();
        assert!(matches!(err, AppError::StreamRead(_)));
    }

    #[test]
    fn test_interleaved_noise_between_objects() {
        let mut scanner = JsonObjectStream::new();
        let objects = scanner.push(b"\n\n{\"a\":1}\n\n").unwrap();
        assert_eq!(objects, vec!["{\"a\":1}"]);
    }
}
