//! Bounded log of metadata operations.

use brokersim_types::MetadataOp;
use std::collections::VecDeque;

/// Default number of entries kept.
pub const DEFAULT_LOG_CAPACITY: usize = 10;

/// Append-only window over the most recent metadata operations.
///
/// Once full, each append evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct MetadataLog {
    entries: VecDeque<MetadataOp>,
    capacity: usize,
}

impl MetadataLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, op: MetadataOp) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(op);
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MetadataOp> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&MetadataOp> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<MetadataOp> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for MetadataLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokersim_types::{BrokerId, MetadataMode, MetadataOpKind};
    use std::time::Duration;

    fn op(secs: u64) -> MetadataOp {
        MetadataOp {
            at: Duration::from_secs(secs),
            mode: MetadataMode::Primary,
            kind: MetadataOpKind::Elect,
            controller: Some(BrokerId(101)),
        }
    }

    #[test]
    fn test_oldest_entries_are_evicted() {
        let mut log = MetadataLog::new(3);
        for secs in 0..5 {
            log.push(op(secs));
        }

        assert_eq!(log.len(), 3);
        let times: Vec<u64> = log.iter().map(|o| o.at.as_secs()).collect();
        assert_eq!(times, vec![2, 3, 4]);
        assert_eq!(log.last().map(|o| o.at.as_secs()), Some(4));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = MetadataLog::new(0);
        log.push(op(1));
        assert!(log.is_empty());
    }
}
