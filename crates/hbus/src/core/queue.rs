// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded per-peer receive queue
//!
//! Each peer owns one [`BoundedQueue`] limited both by total queued bytes
//! and by message count. The queue itself is a plain data structure: all
//! admission decisions and mutation happen under the bus serialization
//! lock, and because enqueue is performed under that lock at admission
//! time, the queue is in stamped sequence order by construction. Dequeue
//! therefore simply takes the head.
//!
//! Blocking/wakeup choreography (condvars) lives with the bus state, not
//! here.

use std::collections::VecDeque;

use super::message::QueuedMessage;

/// FIFO message buffer bounded by bytes and by entry count.
pub(crate) struct BoundedQueue {
    items: VecDeque<QueuedMessage>,
    bytes: usize,
    max_bytes: usize,
    max_msgs: usize,
}

impl BoundedQueue {
    pub fn new(max_bytes: usize, max_msgs: usize) -> Self {
        Self {
            items: VecDeque::new(),
            bytes: 0,
            max_bytes,
            max_msgs,
        }
    }

    /// Whether a message charging `len` bytes can be admitted right now.
    #[inline]
    pub fn has_room(&self, len: usize) -> bool {
        self.items.len() < self.max_msgs && self.bytes + len <= self.max_bytes
    }

    /// Whether a message of `len` bytes could ever fit, even into an empty
    /// queue. False means the send must fail `MessageTooLarge` rather than
    /// block forever.
    #[inline]
    pub fn could_ever_fit(&self, len: usize) -> bool {
        len <= self.max_bytes
    }

    /// Append a message, charging its visible bytes against the byte bound.
    ///
    /// Caller must have checked [`has_room`] under the bus lock.
    ///
    /// [`has_room`]: BoundedQueue::has_room
    pub fn push(&mut self, msg: QueuedMessage) {
        self.bytes += msg.charged_bytes();
        self.items.push_back(msg);
    }

    /// Remove and return the oldest message, freeing its byte charge.
    pub fn pop(&mut self) -> Option<QueuedMessage> {
        let msg = self.items.pop_front()?;
        self.bytes -= msg.charged_bytes();
        Some(msg)
    }

    /// Discard everything (connection teardown); handles close on drop.
    ///
    /// Returns the number of messages discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.items.len();
        self.items.clear();
        self.bytes = 0;
        discarded
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn queued_bytes(&self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}
