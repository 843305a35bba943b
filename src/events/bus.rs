//! # Bounded publish queue for events awaiting fan-out.
//!
//! [`Bus`] is a fixed-capacity FIFO drained once per supervisor-loop
//! iteration. Publishing is non-blocking and never suspends: when the queue
//! is full the publish is rejected with [`KernelError::QueueFull`] and the
//! caller decides what to log.
//!
//! The queue sits behind its own mutex so embedded callers may publish from
//! outside the loop thread; the supervisor loop is the only consumer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::error::KernelError;
use crate::events::Event;

/// Fixed-capacity FIFO of events awaiting fan-out.
pub struct Bus {
    queue: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl Bus {
    /// Creates a bus holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Validates the fields, copies them into an owned event, and enqueues
    /// it. Never blocks.
    pub fn publish(&self, kind: &str, sender: &str, data: &str) -> Result<(), KernelError> {
        self.publish_event(Event::new(kind, sender, data)?)
    }

    /// Enqueues an already-built event.
    pub fn publish_event(&self, event: Event) -> Result<(), KernelError> {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return Err(KernelError::QueueFull);
        }
        queue.push_back(event);
        Ok(())
    }

    /// Removes and returns every queued event in arrival order.
    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of queued events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A poisoned mutex only means a panic elsewhere; the queue itself stays
    // coherent, so keep going with the inner value.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_publish_order() {
        let bus = Bus::new(8);
        bus.publish("A", "one", "1").unwrap();
        bus.publish("B", "one", "2").unwrap();
        bus.publish("A", "two", "3").unwrap();

        let drained = bus.drain();
        let kinds: Vec<&str> = drained.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["A", "B", "A"]);
        assert!(bus.is_empty());
    }

    #[test]
    fn rejects_when_full() {
        let bus = Bus::new(2);
        bus.publish("E", "s", "").unwrap();
        bus.publish("E", "s", "").unwrap();
        let err = bus.publish("E", "s", "").unwrap_err();
        assert!(matches!(err, KernelError::QueueFull));
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn rejects_invalid_fields_without_enqueueing() {
        let bus = Bus::new(2);
        assert!(bus.publish("", "s", "").is_err());
        assert!(bus.publish("T", "", "").is_err());
        assert!(bus.is_empty());
    }
}
