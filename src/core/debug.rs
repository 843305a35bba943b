//! # Diagnostic event ring.
//!
//! When `enable_debug` is configured the kernel keeps a fixed-size ring of
//! diagnostic records alongside the ordinary log: tool lifecycle changes
//! and event traffic. The ring is dumped to the log on shutdown.

use std::collections::VecDeque;
use std::time::SystemTime;

/// What a diagnostic record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugKind {
    ToolStart,
    ToolStop,
    ToolCrash,
    EventPublish,
    EventDeliver,
}

impl DebugKind {
    fn as_str(&self) -> &'static str {
        match self {
            DebugKind::ToolStart => "TOOL_START",
            DebugKind::ToolStop => "TOOL_STOP",
            DebugKind::ToolCrash => "TOOL_CRASH",
            DebugKind::EventPublish => "EVENT_PUBLISH",
            DebugKind::EventDeliver => "EVENT_DELIVER",
        }
    }
}

/// One captured diagnostic record.
#[derive(Clone, Debug)]
pub struct DebugRecord {
    pub kind: DebugKind,
    pub at: SystemTime,
    pub tool: String,
    pub detail: String,
}

/// Fixed-size ring of diagnostic records.
#[derive(Debug)]
pub struct DebugRing {
    records: VecDeque<DebugRecord>,
    capacity: usize,
    captured: u64,
}

impl Default for DebugRing {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl DebugRing {
    /// Creates a ring holding the most recent `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            captured: 0,
        }
    }

    /// Captures one record, evicting the oldest when full.
    pub fn record(&mut self, kind: DebugKind, tool: &str, detail: impl Into<String>) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(DebugRecord {
            kind,
            at: SystemTime::now(),
            tool: tool.to_string(),
            detail: detail.into(),
        });
        self.captured += 1;
    }

    /// Lifetime count of captured records.
    pub fn captured(&self) -> u64 {
        self.captured
    }

    /// Iterates the retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DebugRecord> {
        self.records.iter()
    }

    /// Writes the retained tail (at most 100 records) to the log.
    pub fn dump(&self) {
        log::info!("debug ring: {} records captured", self.captured);
        let skip = self.records.len().saturating_sub(100);
        for record in self.records.iter().skip(skip) {
            log::info!(
                "[{}] {} {}",
                record.kind.as_str(),
                record.tool,
                record.detail
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retains_only_the_most_recent_records() {
        let mut ring = DebugRing::new(3);
        for n in 0..5 {
            ring.record(DebugKind::EventPublish, "gen", format!("event {n}"));
        }
        assert_eq!(ring.captured(), 5);
        let details: Vec<&str> = ring.iter().map(|r| r.detail.as_str()).collect();
        assert_eq!(details, vec!["event 2", "event 3", "event 4"]);
    }
}
