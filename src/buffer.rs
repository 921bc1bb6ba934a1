// src/buffer.rs - Fixed-capacity FIFO window
use std::collections::VecDeque;

/// Keeps the most recent `capacity` items in arrival order.
///
/// Pushing onto a full buffer evicts exactly one item from the front, so
/// the length never exceeds the capacity after any push.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RollingBuffer<T> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends an item, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Changes the capacity, dropping the oldest items that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.items.iter()
    }

    /// The last `n` items, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a RollingBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_items_in_order() {
        let mut buffer = RollingBuffer::new(3);
        for i in 0..10 {
            buffer.push(i);
            assert!(buffer.len() <= 3);
            let expected: Vec<i32> = ((i - 2).max(0)..=i).collect();
            assert_eq!(buffer.to_vec(), expected);
        }
        assert_eq!(buffer.oldest(), Some(&7));
        assert_eq!(buffer.latest(), Some(&9));
    }

    #[test]
    fn push_reports_single_eviction() {
        let mut buffer = RollingBuffer::new(2);
        assert_eq!(buffer.push('a'), None);
        assert_eq!(buffer.push('b'), None);
        assert_eq!(buffer.push('c'), Some('a'));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn shrinking_drops_oldest() {
        let mut buffer = RollingBuffer::new(5);
        (1..=5).for_each(|i| {
            buffer.push(i);
        });
        buffer.set_capacity(2);
        assert_eq!(buffer.to_vec(), vec![4, 5]);
    }

    #[test]
    fn recent_returns_tail() {
        let mut buffer = RollingBuffer::new(10);
        (0..6).for_each(|i| {
            buffer.push(i);
        });
        assert_eq!(buffer.recent(3).copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(buffer.recent(100).count(), 6);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let buffer: RollingBuffer<u8> = RollingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }
}
