use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("ring buffer capacity must be >= 1")]
    ZeroCapacity,
}

/// What `add` does when the buffer is already at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oldest item to make room. `add` never fails.
    OverwriteOldest,
    /// Refuse the new item. `add` returns false.
    Reject,
}

/// Result of a `push`, carrying whichever item did not end up in the buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome<T> {
    Added,
    Evicted(T),
    Rejected(T),
}

/// Fixed-capacity FIFO shared between one producer and one consumer.
///
/// Every operation takes the same lock for its whole duration, so a
/// size check and the mutation it guards can never interleave with
/// another thread.
pub struct BoundedRingBuffer<T> {
    inner: Mutex<Ring<T>>,
    policy: OverflowPolicy,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn take_head(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        item
    }

    fn put_tail(&mut self, item: T) {
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
    }
}

impl<T> BoundedRingBuffer<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            inner: Mutex::new(Ring {
                slots: std::iter::repeat_with(|| None).take(capacity).collect(),
                head: 0,
                tail: 0,
                count: 0,
            }),
            policy,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        // Each operation leaves the ring consistent before it can panic,
        // so a poisoned lock still guards valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Inserts `item`, reporting what the overflow policy displaced.
    pub fn push(&self, item: T) -> PushOutcome<T> {
        let mut ring = self.lock();
        if ring.count < ring.capacity() {
            ring.put_tail(item);
            return PushOutcome::Added;
        }

        match self.policy {
            OverflowPolicy::Reject => PushOutcome::Rejected(item),
            OverflowPolicy::OverwriteOldest => {
                let oldest = ring.take_head();
                ring.put_tail(item);
                match oldest {
                    Some(old) => PushOutcome::Evicted(old),
                    None => PushOutcome::Added,
                }
            }
        }
    }

    /// Returns false only when the buffer is full under `OverflowPolicy::Reject`.
    pub fn add(&self, item: T) -> bool {
        !matches!(self.push(item), PushOutcome::Rejected(_))
    }

    /// Removes and returns the oldest item.
    pub fn poll(&self) -> Option<T> {
        self.lock().take_head()
    }

    pub fn size(&self) -> usize {
        self.lock().count
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        let ring = self.lock();
        ring.count == ring.capacity()
    }

    pub fn clear(&self) {
        let mut ring = self.lock();
        while ring.take_head().is_some() {}
        ring.head = 0;
        ring.tail = 0;
    }
}

impl<T: Clone> BoundedRingBuffer<T> {
    pub fn peek(&self) -> Option<T> {
        let ring = self.lock();
        if ring.count == 0 {
            return None;
        }
        ring.slots[ring.head].clone()
    }

    /// Copies the queued items, oldest first.
    pub fn to_snapshot(&self) -> Vec<T> {
        let ring = self.lock();
        let cap = ring.capacity();
        (0..ring.count)
            .filter_map(|offset| ring.slots[(ring.head + offset) % cap].clone())
            .collect()
    }
}
