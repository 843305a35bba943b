//! # Per-tool inbox: a fixed-capacity ring of event lines.
//!
//! An [`Inbox`] holds serialized event lines awaiting delivery to a tool's
//! stdin. When the ring is full the configured [`OverflowPolicy`] decides
//! what gives way.
//!
//! Peek and pop are separate operations so the supervisor can attempt a
//! write to the child and only pop once the whole line has drained; a
//! partial or would-block write leaves the line at the front for retry.

use std::collections::VecDeque;

/// What to do when a full ring receives another line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest line to make room (default). Freshness over history.
    DropOldest,
    /// Discard the incoming line. Stale events over reordered ones.
    DropNewest,
    /// Refuse the line and report `Full`; the caller applies backpressure.
    Block,
}

impl Default for OverflowPolicy {
    /// Returns [`OverflowPolicy::DropOldest`].
    fn default() -> Self {
        OverflowPolicy::DropOldest
    }
}

impl OverflowPolicy {
    /// Parses the configuration-file spelling (`drop_oldest`,
    /// `drop_newest`, `block`), case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" => Some(OverflowPolicy::DropOldest),
            "drop_newest" => Some(OverflowPolicy::DropNewest),
            "block" => Some(OverflowPolicy::Block),
            _ => None,
        }
    }
}

/// Result of pushing a line into an [`Inbox`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The line was accepted.
    Pushed,
    /// The line was discarded under `DropNewest`.
    Dropped,
    /// The ring is full under `Block`; nothing changed.
    Full,
}

/// Fixed-capacity FIFO of owned event lines with overflow accounting.
#[derive(Debug)]
pub struct Inbox {
    lines: VecDeque<String>,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: u64,
    delivered: u64,
}

impl Inbox {
    /// Creates an inbox holding at most `capacity` lines. A zero capacity
    /// is clamped to one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            dropped: 0,
            delivered: 0,
        }
    }

    /// Pushes a line, applying the overflow policy when full.
    pub fn push(&mut self, line: &str) -> PushOutcome {
        if self.lines.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    self.lines.pop_front();
                    self.dropped += 1;
                }
                OverflowPolicy::DropNewest => {
                    self.dropped += 1;
                    return PushOutcome::Dropped;
                }
                OverflowPolicy::Block => return PushOutcome::Full,
            }
        }
        self.lines.push_back(line.to_string());
        PushOutcome::Pushed
    }

    /// Returns the front line without removing it.
    pub fn peek(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    /// Removes the front line, counting it as delivered.
    pub fn pop(&mut self) -> Option<String> {
        let line = self.lines.pop_front();
        if line.is_some() {
            self.delivered += 1;
        }
        line
    }

    /// Discards every queued line. Counters are untouched.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of queued lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when the ring is at capacity.
    pub fn is_full(&self) -> bool {
        self.lines.len() >= self.capacity
    }

    /// Maximum number of queued lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime count of lines discarded by overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Lifetime count of lines popped for delivery.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Iterates the queued lines front to back.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
