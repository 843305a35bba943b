//! # Line reassembly for child streams.
//!
//! A child's stdout and stderr arrive as arbitrary chunks. Each stream gets
//! one [`LineAssembler`] that accumulates bytes and emits whole lines:
//! trailing `\r` is stripped, empty lines are skipped, and a line that
//! exceeds the configured cap is cut there, with the overflow discarded
//! until the next newline.

use crate::config::MAX_LINE_BYTES;

/// Per-stream byte accumulator turning chunks into whole lines.
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    max_line: usize,
    // Inside an over-long line; swallow bytes until the next newline.
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineAssembler {
    /// Creates an assembler that cuts lines at `max_line` bytes.
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line: max_line.max(1),
            discarding: false,
        }
    }

    /// Appends a chunk and returns every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if let Some(line) = finish(&mut self.buf) {
                    lines.push(line);
                }
                continue;
            }
            if self.discarding {
                continue;
            }
            self.buf.push(byte);
            if self.buf.len() >= self.max_line {
                log::warn!(
                    "line exceeded {} bytes; overflow discarded",
                    self.max_line
                );
                if let Some(line) = finish(&mut self.buf) {
                    lines.push(line);
                }
                self.discarding = true;
            }
        }
        lines
    }

    /// Emits any trailing unterminated content. Call when the source pipe
    /// has closed.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.discarding {
            self.discarding = false;
            self.buf.clear();
            return None;
        }
        finish(&mut self.buf)
    }

    /// Bytes currently buffered without a terminating newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn finish(buf: &mut Vec<u8>) -> Option<String> {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.is_empty() {
        return None;
    }
    let line = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_across_chunks() {
        let mut asm = LineAssembler::default();
        assert!(asm.feed(b"hel").is_empty());
        assert_eq!(asm.feed(b"lo\nwor"), vec!["hello".to_string()]);
        assert_eq!(asm.feed(b"ld\n"), vec!["world".to_string()]);
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn strips_carriage_returns_and_skips_empty_lines() {
        let mut asm = LineAssembler::default();
        let lines = asm.feed(b"one\r\n\r\n\ntwo\n");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn cuts_over_long_lines_and_discards_the_overflow() {
        let mut asm = LineAssembler::new(8);
        let lines = asm.feed(b"0123456789abcdef\nnext\n");
        assert_eq!(lines, vec!["01234567".to_string(), "next".to_string()]);
    }

    #[test]
    fn discard_state_spans_chunks() {
        let mut asm = LineAssembler::new(4);
        let first = asm.feed(b"abcdefgh");
        assert_eq!(first, vec!["abcd".to_string()]);
        assert!(asm.feed(b"ijkl").is_empty());
        assert_eq!(asm.feed(b"\nok\n"), vec!["ok".to_string()]);
    }

    #[test]
    fn remainder_flushes_a_closed_stream() {
        let mut asm = LineAssembler::default();
        assert!(asm.feed(b"tail without newline").is_empty());
        assert_eq!(asm.take_remainder().as_deref(), Some("tail without newline"));
        assert_eq!(asm.take_remainder(), None);
    }

    #[test]
    fn remainder_of_a_discarded_line_is_dropped() {
        let mut asm = LineAssembler::new(4);
        asm.feed(b"abcdefgh");
        assert_eq!(asm.take_remainder(), None);
    }
}
