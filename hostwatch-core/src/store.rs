use crate::metrics::Sample;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Fixed-capacity FIFO shared between one writer and many readers.
///
/// Pushes and reads take the same lock, so a reader sees the buffer either
/// before or after a push, never in between.
pub struct BoundedBuffer<T> {
    items: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, item: T) {
        let mut items = self.items.write();
        items.push_back(item);
        while items.len() > self.capacity {
            items.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<T> {
        self.items.read().back().cloned()
    }

    /// The newest `n` entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        self.items.read().iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

/// Retained history of samples, oldest first.
pub struct TimeSeriesStore {
    samples: BoundedBuffer<Sample>,
}

impl TimeSeriesStore {
    pub const DEFAULT_CAPACITY: usize = 3600;

    pub fn new(capacity: usize) -> Self {
        Self {
            samples: BoundedBuffer::new(capacity),
        }
    }

    pub fn append(&self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn read_all(&self) -> Vec<Sample> {
        self.samples.snapshot()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.latest()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
