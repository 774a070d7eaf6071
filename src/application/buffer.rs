//! Early-message buffering.
//!
//! Until a real router is registered, records accumulate in a bounded ring
//! buffer (oldest dropped first). The first router to register adopts the
//! contents; a buffer nobody adopts is discarded after a grace period.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Capacity of the early message buffer.
pub const EARLY_MESSAGE_CAPACITY: usize = 100;
/// Capacity of the early trace buffer.
pub const EARLY_TRACE_CAPACITY: usize = 200;

/// Bounded buffer that is either collecting or closed for good.
#[derive(Debug)]
pub struct EarlyBuffer<T> {
    capacity: usize,
    // None once adopted or discarded.
    items: Mutex<Option<VecDeque<T>>>,
}

impl<T> EarlyBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(Some(VecDeque::with_capacity(capacity))),
        }
    }

    /// Buffer a record. Returns false once the buffer is closed.
    pub fn push(&self, item: T) -> bool {
        let mut items = self.lock();
        match items.as_mut() {
            Some(queue) => {
                if self.capacity == 0 {
                    return true;
                }
                if queue.len() == self.capacity {
                    queue.pop_front();
                }
                queue.push_back(item);
                true
            }
            None => false,
        }
    }

    /// Hand the buffered records to an adopter and close the buffer.
    ///
    /// Returns `None` if the buffer was already adopted or discarded.
    pub fn adopt(&self) -> Option<Vec<T>> {
        self.lock().take().map(Vec::from)
    }

    /// Drop the buffered records and close the buffer.
    ///
    /// Returns how many records were dropped.
    pub fn discard(&self) -> usize {
        self.lock().take().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<VecDeque<T>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
