//! Outbound message queue
//!
//! Holds encoded frames produced by `send()` while the connection is not
//! ready. Drained front to back once the handshake completes.

use crate::error::{Result, SessionError};
use std::collections::VecDeque;
use std::time::Instant;

/// One outbound frame waiting for the connection to become ready
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Wire `type` of the frame
    pub kind: &'static str,
    /// Encoded frame text
    pub frame: String,
    pub enqueued_at: Instant,
}

/// FIFO buffer of outbound frames with an optional capacity
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<QueuedMessage>,
    capacity: Option<usize>,
}

impl MessageQueue {
    /// Create a queue. `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append a frame. Rejects the new frame when the queue is full;
    /// frames already queued are never evicted.
    pub fn push(&mut self, kind: &'static str, frame: String) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.items.len() >= capacity {
                return Err(SessionError::QueueFull { capacity });
            }
        }

        self.items.push_back(QueuedMessage {
            kind,
            frame,
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    pub fn front(&self) -> Option<&QueuedMessage> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<QueuedMessage> {
        self.items.pop_front()
    }

    /// Put a frame back at the head, e.g. after a failed transmission
    pub(crate) fn requeue_front(&mut self, message: QueuedMessage) {
        self.items.push_front(message);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Drop everything, returning how many frames were discarded
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.items.iter()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(None)
    }
}
