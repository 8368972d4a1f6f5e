//! ==============================================================================
//! buffer.rs - bounded, deduplicated, time-ordered reading history
//! ==============================================================================
//!
//! invariants held after every merge:
//!     - no two readings share an id
//!     - readings are sorted ascending by timestamp
//!     - len() <= capacity()
//!
//! ==============================================================================

use crate::domain::Reading;

/// Counters describing what one merge did, for logging
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub appended: usize,
    pub replaced: usize,
    /// same id, older timestamp than what is stored
    pub stale: usize,
    /// dropped from the front to stay within capacity
    pub evicted: usize,
}

#[derive(Clone, Debug)]
pub struct ReadingBuffer {
    readings: Vec<Reading>,
    capacity: usize,
}

impl ReadingBuffer {
    /// `capacity` is clamped to at least one reading
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Merge a freshly fetched batch.
    ///
    /// A reading whose id is already stored replaces the stored one in place,
    /// unless it is older than it. Everything else is appended. The buffer is
    /// then re-sorted by timestamp and the oldest entries beyond capacity are
    /// dropped.
    pub fn merge<I>(&mut self, incoming: I) -> MergeOutcome
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut outcome = MergeOutcome::default();

        for reading in incoming {
            match self.readings.iter_mut().find(|r| r.id == reading.id) {
                Some(existing) if reading.timestamp >= existing.timestamp => {
                    *existing = reading;
                    outcome.replaced += 1;
                }
                Some(_) => outcome.stale += 1,
                None => {
                    self.readings.push(reading);
                    outcome.appended += 1;
                }
            }
        }

        // stable, so equal timestamps keep arrival order
        self.readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        if self.readings.len() > self.capacity {
            outcome.evicted = self.readings.len() - self.capacity;
            self.readings.drain(..outcome.evicted);
        }

        outcome
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn previous(&self) -> Option<&Reading> {
        self.readings.len().checked_sub(2).map(|i| &self.readings[i])
    }

    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
