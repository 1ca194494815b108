// ── Duplicate event suppression ──

use std::collections::{HashSet, VecDeque};

/// Bounded memory of delivered event ids.
///
/// Holds the most recent `capacity` ids in FIFO order. Evicted ids raise a
/// high-water floor; vendor event ids only grow, so anything at or below
/// the floor has already been delivered.
#[derive(Debug)]
pub(crate) struct RecentEventIds {
    capacity: usize,
    order: VecDeque<u64>,
    seen: HashSet<u64>,
    floor: Option<u64>,
}

impl RecentEventIds {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            floor: None,
        }
    }

    /// Record `id`. Returns `true` if it has not been seen before.
    pub(crate) fn insert(&mut self, id: u64) -> bool {
        if self.floor.is_some_and(|floor| id <= floor) || !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
                self.floor = Some(self.floor.map_or(evicted, |f| f.max(evicted)));
            }
        }
        true
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.floor.is_some_and(|floor| id <= floor) || self.seen.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_rejected() {
        let mut ids = RecentEventIds::new(4);
        assert!(ids.insert(10));
        assert!(!ids.insert(10));
        assert!(ids.insert(11));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn eviction_is_fifo_and_bounded() {
        let mut ids = RecentEventIds::new(3);
        for id in 1..=5 {
            assert!(ids.insert(id));
        }
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(3));
        assert!(ids.contains(5));
    }

    #[test]
    fn evicted_ids_stay_rejected() {
        let mut ids = RecentEventIds::new(2);
        ids.insert(1);
        ids.insert(2);
        ids.insert(3);
        // 1 was evicted but sits below the floor.
        assert!(!ids.insert(1));
        assert!(ids.insert(4));
    }

    #[test]
    fn zero_capacity_still_dedups_latest() {
        let mut ids = RecentEventIds::new(0);
        assert!(ids.insert(7));
        assert!(!ids.insert(7));
    }
}
