//! Bounded sample series for the utilization sparklines.

use std::collections::VecDeque;

/// Samples kept per series unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Chronological, fixed-capacity series of samples.
///
/// Appending past capacity evicts the oldest sample. The most recent sample
/// is always last.
#[derive(Debug, Clone, PartialEq)]
pub struct RateHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RateHistory {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Return this history with `value` appended, leaving `self` untouched.
    #[must_use]
    pub fn append(&self, value: f64) -> Self {
        let mut next = self.clone();
        if next.samples.len() == next.capacity {
            next.samples.pop_front();
        }
        next.samples.push_back(value);
        next
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

impl Default for RateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// The five series the query overview tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateHistories {
    /// Scheduled milliseconds per wall millisecond
    pub scheduled_time_rate: RateHistory,
    /// CPU milliseconds per wall millisecond (effective parallelism)
    pub cpu_time_rate: RateHistory,
    /// Input rows per second
    pub row_input_rate: RateHistory,
    /// Input bytes per second
    pub byte_input_rate: RateHistory,
    /// Current memory reservation in bytes (absolute, not a rate)
    pub reserved_memory: RateHistory,
}

impl RateHistories {
    pub fn with_capacity(capacity: usize) -> Self {
        let empty = RateHistory::new(capacity);
        Self {
            scheduled_time_rate: empty.clone(),
            cpu_time_rate: empty.clone(),
            row_input_rate: empty.clone(),
            byte_input_rate: empty.clone(),
            reserved_memory: empty,
        }
    }
}
