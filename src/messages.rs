use std::collections::VecDeque;

use crate::event::LogEntry;

/// Display-side ring of the most recent entries. Eviction only affects what is shown: the
/// file sink has already seen every entry by the time it lands here.
#[derive(Debug, Clone)]
pub struct MessageBuffer<T = LogEntry> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> MessageBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
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

    pub fn append(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Shrinking keeps the newest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
        self.capacity = capacity;
    }

    /// Oldest to newest.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
