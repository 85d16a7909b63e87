//! Result of a concurrent batch step: what went through, and what was dropped and why.

use serde::Serialize;

/// A single item a batch step gave up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Object key or file name the failure belongs to.
    pub item: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    /// Split settled per-item results into successes and failures, keeping input order.
    pub fn collect<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<T, ItemFailure>>,
    {
        let mut outcome = Self::default();
        for result in results {
            match result {
                Ok(value) => outcome.succeeded.push(value),
                Err(failure) => outcome.failed.push(failure),
            }
        }
        outcome
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Share of attempted items that failed; `0.0` for an empty batch.
    pub fn failure_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.failed.len() as f64 / total as f64,
        }
    }
}
