//! Bounded uniform replay buffer for off-policy learning.
//!
//! - **Ring storage**: O(1) insert, oldest transition overwritten at capacity
//! - **Sampling without replacement**: partial Fisher-Yates over a reused
//!   index table, swaps undone after each draw
//! - **Seeded**: sampling draws from an owned `fastrand::Rng`

use crate::core::Transition;
use crate::error::{Result, RlError};

/// Ring buffer with O(1) insert and random access.
#[derive(Debug, Clone)]
struct Ring<T> {
    items: Vec<T>,
    capacity: usize,
    /// Next slot to overwrite once full; also the index of the oldest item.
    write_pos: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.write_pos] = item;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, idx: usize) -> &T {
        &self.items[idx]
    }

    /// Items oldest first.
    fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.items.len() < self.capacity {
            0
        } else {
            self.write_pos
        };
        self.items[split..].iter().chain(self.items[..split].iter())
    }

    fn clear(&mut self) {
        self.items.clear();
        self.write_pos = 0;
    }
}

/// Fixed-capacity transition store with FIFO eviction.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    storage: Ring<Transition>,
    min_ready: usize,
    rng: fastrand::Rng,
    /// Identity permutation `0..n` between samples; grows with the storage.
    indices: Vec<usize>,
}

impl ReplayBuffer {
    /// Create a buffer holding at most `capacity` transitions that becomes
    /// [`ready`](Self::ready) at `min_ready`.
    pub fn new(capacity: usize, min_ready: usize) -> Self {
        Self::with_rng(capacity, min_ready, fastrand::Rng::new())
    }

    pub fn with_seed(capacity: usize, min_ready: usize, seed: u64) -> Self {
        Self::with_rng(capacity, min_ready, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(capacity: usize, min_ready: usize, rng: fastrand::Rng) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: Ring::new(capacity),
            min_ready,
            rng,
            indices: Vec::new(),
        }
    }

    /// Append a transition, evicting the oldest when full.
    pub fn add(&mut self, transition: Transition) {
        self.storage.push(transition);
    }

    /// Sample `batch_size` distinct transitions uniformly at random.
    ///
    /// Fails with `InsufficientData` when the buffer is not ready or holds
    /// fewer than `batch_size` transitions.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<Transition>> {
        let available = self.storage.len();
        if batch_size > available || available < self.min_ready {
            return Err(RlError::InsufficientData {
                requested: batch_size,
                available,
                min_ready: self.min_ready,
            });
        }

        for idx in self.indices.len()..available {
            self.indices.push(idx);
        }

        // Partial Fisher-Yates, then undo the swaps in reverse
        let mut swaps = Vec::with_capacity(batch_size);
        let mut batch = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let j = self.rng.usize(i..available);
            self.indices.swap(i, j);
            swaps.push(j);
            batch.push(self.storage.get(self.indices[i]).clone());
        }
        for (i, j) in swaps.into_iter().enumerate().rev() {
            self.indices.swap(i, j);
        }
        Ok(batch)
    }

    /// Whether enough transitions are stored to start learning.
    pub fn ready(&self) -> bool {
        self.storage.len() >= self.min_ready
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }

    pub fn min_ready(&self) -> usize {
        self.min_ready
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.storage.iter()
    }
}
