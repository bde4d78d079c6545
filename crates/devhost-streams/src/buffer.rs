//! Generic bounded, FIFO-evicting buffer. `MessageStreamService` keeps one
//! of these per session to hold that session's log messages.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A buffer with a hard cap on length: once full, the oldest entry is
/// dropped to make room for the newest.
pub struct BoundedBuffer<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Appends `item`, evicting the oldest entry if the buffer is full.
    /// Returns `true` when an eviction occurred.
    pub fn push(&self, item: T) -> bool {
        // Data loss from a poisoned lock is acceptable here; panicking the
        // caller over a log buffer is not.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let evicted = if entries.len() >= self.capacity {
            entries.pop_front();
            true
        } else {
            false
        };
        entries.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Returns up to `take` entries starting at `skip`, oldest first.
    pub fn page(&self, skip: usize, take: usize) -> Vec<T>
    where
        T: Clone,
    {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().skip(skip).take(take).cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_once_full() {
        let buffer = BoundedBuffer::new(3);
        assert!(!buffer.push(1));
        assert!(!buffer.push(2));
        assert!(!buffer.push(3));
        assert!(buffer.push(4));
        assert_eq!(buffer.snapshot(), vec![2, 3, 4]);
    }

    #[test]
    fn page_slices_oldest_first() {
        let buffer = BoundedBuffer::new(10);
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.page(1, 2), vec![1, 2]);
        assert_eq!(buffer.page(4, 10), vec![4]);
        assert_eq!(buffer.page(10, 10), Vec::<i32>::new());
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buffer = BoundedBuffer::new(4);
        buffer.push(1);
        buffer.push(2);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
