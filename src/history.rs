//! Fixed-capacity, append-only history.
//!
//! Every store backend routes history appends through [`BoundedHistory`], so
//! the retention cap is enforced here and nowhere else.

use std::collections::VecDeque;

/// Number of samples retained per station.
pub const HISTORY_CAP: usize = 50;

// ---

/// Chronological sequence holding at most `cap` items; the oldest are evicted first.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory<T> {
    // ---
    cap: usize,
    items: VecDeque<T>,
}

impl<T> BoundedHistory<T> {
    // ---
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            items: VecDeque::with_capacity(cap),
        }
    }

    /// Rebuild from previously stored samples, dropping the oldest if the
    /// stored sequence is already over capacity.
    pub fn from_vec(cap: usize, items: Vec<T>) -> Self {
        // ---
        let mut history = Self {
            cap,
            items: VecDeque::from(items),
        };
        history.evict();
        history
    }

    /// Append one item and evict from the front until within capacity.
    pub fn push(&mut self, item: T) {
        // ---
        self.items.push_back(item);
        self.evict();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into()
    }

    fn evict(&mut self) {
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_push_under_capacity_keeps_everything() {
        // ---
        let mut history = BoundedHistory::new(3);
        history.push(1);
        history.push(2);

        assert_eq!(history.len(), 2);
        assert_eq!(history.into_vec(), vec![1, 2]);
    }

    #[test]
    fn test_push_over_capacity_evicts_oldest() {
        // ---
        let mut history = BoundedHistory::new(HISTORY_CAP);
        for i in 0..(HISTORY_CAP + 10) {
            history.push(i);
        }

        assert_eq!(history.len(), HISTORY_CAP);
        let items = history.into_vec();
        assert_eq!(items.first(), Some(&10));
        assert_eq!(items.last(), Some(&(HISTORY_CAP + 9)));
        assert!(items.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_from_vec_trims_oversized_input() {
        // ---
        let history = BoundedHistory::from_vec(2, vec!['a', 'b', 'c', 'd']);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec!['c', 'd']);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        // ---
        let mut history = BoundedHistory::new(0);
        history.push("x");
        assert!(history.is_empty());
    }
}
