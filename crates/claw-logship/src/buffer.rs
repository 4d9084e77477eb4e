//! Bounded buffer of pending log events.

use crate::types::{LogEvent, MAX_ITEMS_PER_BATCH};

/// Pending events awaiting a flush.
///
/// Not synchronized; the appender serializes access.
#[derive(Debug)]
pub struct BatchBuffer {
    events: Vec<LogEvent>,
    capacity: usize,
}

impl BatchBuffer {
    /// Creates a buffer that asks for a flush at `capacity` events.
    ///
    /// `capacity` is clamped to `1..=MAX_ITEMS_PER_BATCH`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds an event.
    pub fn add(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    /// Returns true once the buffer holds `capacity` events or more.
    #[must_use]
    pub fn should_flush(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// Removes and returns all pending events in insertion order.
    pub fn drain(&mut self) -> Vec<LogEvent> {
        std::mem::replace(&mut self.events, Vec::with_capacity(self.capacity))
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Flush threshold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the flush threshold, returning the effective value.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = clamp_capacity(capacity);
        self.events
            .reserve(self.capacity.saturating_sub(self.events.len()));
        self.capacity
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(1, MAX_ITEMS_PER_BATCH)
}
