//! # Events exchanged between the kernel and its tools.
//!
//! An [`Event`] is a text record of a type, a sender, and a data payload,
//! captured with a wall-clock timestamp. On the wire (a child's stdin or
//! stdout) an event is exactly one line:
//!
//! ```text
//! TYPE|SENDER|DATA\n
//! ```
//!
//! The first two `|` are separators; any further `|` belongs to `DATA`.
//! The sender field is declarative: the kernel takes it verbatim from the
//! child and never rewrites it.

use std::time::SystemTime;

use crate::config::{MAX_EVENT_DATA, MAX_EVENT_TYPE, MAX_TOOL_NAME};
use crate::error::KernelError;

/// A single event: `kind` (the event type), `sender`, `data`, and the
/// capture timestamp.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event type. At most [`MAX_EVENT_TYPE`] bytes, no `|` or newline.
    pub kind: String,
    /// Declared sender name. At most [`MAX_TOOL_NAME`] bytes.
    pub sender: String,
    /// Payload. At most [`MAX_EVENT_DATA`] bytes, no newline.
    pub data: String,
    /// When the kernel captured the event.
    pub at: SystemTime,
}

impl Event {
    /// Builds an event from its three fields, validating the type and
    /// sender and truncating over-long fields at their byte caps.
    ///
    /// Returns [`KernelError::InvalidArg`] for an empty type or sender, or
    /// a type containing `|` or a newline.
    pub fn new(kind: &str, sender: &str, data: &str) -> Result<Self, KernelError> {
        if kind.is_empty() {
            return Err(KernelError::InvalidArg {
                reason: "event type is empty".to_string(),
            });
        }
        if sender.is_empty() {
            return Err(KernelError::InvalidArg {
                reason: "event sender is empty".to_string(),
            });
        }
        if kind.contains('|') || kind.contains('\n') {
            return Err(KernelError::InvalidArg {
                reason: format!("event type '{kind}' contains a separator"),
            });
        }
        if sender.contains('|') || sender.contains('\n') {
            return Err(KernelError::InvalidArg {
                reason: format!("event sender '{sender}' contains a separator"),
            });
        }
        if data.contains('\n') {
            return Err(KernelError::InvalidArg {
                reason: "event data contains a newline".to_string(),
            });
        }
        Ok(Self {
            kind: truncate_bytes(kind, MAX_EVENT_TYPE).to_string(),
            sender: truncate_bytes(sender, MAX_TOOL_NAME).to_string(),
            data: truncate_data(data),
            at: SystemTime::now(),
        })
    }

    /// Parses one wire line into an event.
    ///
    /// Trailing `\r`/`\n` are accepted. A line without two `|` separators,
    /// or with an empty type or sender, fails with
    /// [`KernelError::ParseFailed`].
    pub fn parse(line: &str) -> Result<Self, KernelError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(3, '|');
        let kind = fields.next().unwrap_or("");
        let sender = fields.next().ok_or_else(|| KernelError::ParseFailed {
            reason: "missing sender separator".to_string(),
        })?;
        let data = fields.next().ok_or_else(|| KernelError::ParseFailed {
            reason: "missing data separator".to_string(),
        })?;
        if kind.is_empty() || sender.is_empty() {
            return Err(KernelError::ParseFailed {
                reason: "empty type or sender".to_string(),
            });
        }
        Ok(Self {
            kind: truncate_bytes(kind, MAX_EVENT_TYPE).to_string(),
            sender: truncate_bytes(sender, MAX_TOOL_NAME).to_string(),
            data: truncate_data(data),
            at: SystemTime::now(),
        })
    }

    /// Serializes the event to its wire form, including the trailing
    /// newline.
    pub fn serialize(&self) -> String {
        format!("{}|{}|{}\n", self.kind, self.sender, self.data)
    }
}

/// Clamps `data` at [`MAX_EVENT_DATA`] bytes, warning when bytes are cut.
fn truncate_data(data: &str) -> String {
    if data.len() > MAX_EVENT_DATA {
        log::warn!(
            "event data truncated from {} to {} bytes",
            data.len(),
            MAX_EVENT_DATA
        );
    }
    truncate_bytes(data, MAX_EVENT_DATA).to_string()
}

/// Cuts `s` at `max` bytes, backing off to the previous character boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_parse_round_trips() {
        let event = Event::new("STATUS", "probe", "cpu=12|mem=34").unwrap();
        let parsed = Event::parse(&event.serialize()).unwrap();
        assert_eq!(parsed.kind, "STATUS");
        assert_eq!(parsed.sender, "probe");
        assert_eq!(parsed.data, "cpu=12|mem=34");
    }

    #[test]
    fn parse_keeps_extra_separators_in_data() {
        let event = Event::parse("A|b|c|d|e\n").unwrap();
        assert_eq!(event.kind, "A");
        assert_eq!(event.sender, "b");
        assert_eq!(event.data, "c|d|e");
    }

    #[test]
    fn parse_accepts_crlf_and_empty_data() {
        let event = Event::parse("PING|gen|\r\n").unwrap();
        assert_eq!(event.kind, "PING");
        assert_eq!(event.data, "");
    }

    #[test]
    fn parse_rejects_lines_without_two_separators() {
        assert!(Event::parse("no separators").is_err());
        assert!(Event::parse("one|separator").is_err());
        assert!(Event::parse("||empty fields").is_err());
    }

    #[test]
    fn data_at_the_cap_survives_one_past_is_cut() {
        let exact = "x".repeat(MAX_EVENT_DATA);
        let event = Event::new("T", "s", &exact).unwrap();
        assert_eq!(event.data.len(), MAX_EVENT_DATA);
        let parsed = Event::parse(&event.serialize()).unwrap();
        assert_eq!(parsed.data.len(), MAX_EVENT_DATA);

        let over = "x".repeat(MAX_EVENT_DATA + 1);
        let event = Event::new("T", "s", &over).unwrap();
        assert_eq!(event.data.len(), MAX_EVENT_DATA);
    }

    #[test]
    fn new_rejects_bad_type_and_sender() {
        assert!(Event::new("", "s", "d").is_err());
        assert!(Event::new("T", "", "d").is_err());
        assert!(Event::new("T|U", "s", "d").is_err());
        assert!(Event::new("T\n", "s", "d").is_err());
        assert!(Event::new("T", "s", "two\nlines").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = format!("{}é", "x".repeat(MAX_EVENT_DATA - 1));
        let event = Event::new("T", "s", &s).unwrap();
        assert!(event.data.len() <= MAX_EVENT_DATA);
        assert!(event.data.is_char_boundary(event.data.len()));
    }
}
