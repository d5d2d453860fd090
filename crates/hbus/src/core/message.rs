// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message representation
//!
//! One admitted send produces one [`QueuedMessage`] per delivery target. The
//! payload bytes are shared (`Arc<[u8]>`) across all copies; what differs per
//! copy is the kept-length decided by the target's receive filter and the
//! duplicated resource handles. Consumers see a [`Delivery`].

use std::sync::Arc;

use super::addr::BusAddress;
use super::resource::ResourceHandle;

/// One queued copy of an admitted message, owned by a peer's receive queue.
pub(crate) struct QueuedMessage {
    /// Bus-wide admission sequence number (monotonic, never reused).
    pub seq: u64,
    /// Sender's default bus address.
    pub sender: BusAddress,
    /// Destination as passed by the sender (`None` = partner routing).
    pub destination: Option<BusAddress>,
    /// Full payload as admitted, shared across all delivery copies.
    pub payload: Arc<[u8]>,
    /// Leading payload bytes visible to this receiver (filter truncation).
    pub kept: usize,
    /// Duplicated handles, independent per receiver.
    pub handles: Vec<ResourceHandle>,
}

impl QueuedMessage {
    /// Bytes charged against the receive queue's byte bound.
    #[inline]
    pub fn charged_bytes(&self) -> usize {
        self.kept
    }

    pub fn into_delivery(self) -> Delivery {
        Delivery {
            seq: self.seq,
            sender: self.sender,
            destination: self.destination,
            payload: self.payload,
            kept: self.kept,
            handles: self.handles,
        }
    }
}

/// A message as observed by the receiving peer.
pub struct Delivery {
    seq: u64,
    sender: BusAddress,
    destination: Option<BusAddress>,
    payload: Arc<[u8]>,
    kept: usize,
    /// Resource handles delivered atomically with the payload.
    pub handles: Vec<ResourceHandle>,
}

impl Delivery {
    /// Admission sequence number stamped by the routing engine.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Default bus address of the sending peer.
    #[inline]
    pub fn sender(&self) -> BusAddress {
        self.sender
    }

    /// Destination the sender addressed (`None` for partner routing).
    #[inline]
    pub fn destination(&self) -> Option<BusAddress> {
        self.destination
    }

    /// Visible payload bytes (after any receive-filter truncation).
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.kept]
    }

    /// Copy the visible payload out into an owned buffer.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload[..self.kept].to_vec()
    }

    /// Take ownership of the attached handles.
    pub fn take_handles(&mut self) -> Vec<ResourceHandle> {
        std::mem::take(&mut self.handles)
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("seq", &self.seq)
            .field("sender", &self.sender)
            .field("destination", &self.destination)
            .field("len", &self.kept)
            .field("handles", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(kept: usize) -> QueuedMessage {
        QueuedMessage {
            seq: 9,
            sender: BusAddress::new(0, 4),
            destination: Some(BusAddress::new(1, 2)),
            payload: Arc::from(&b"truncate-me"[..]),
            kept,
            handles: Vec::new(),
        }
    }

    #[test]
    fn delivery_exposes_kept_prefix_only() {
        let delivery = queued(8).into_delivery();
        assert_eq!(delivery.payload(), b"truncate");
        assert_eq!(delivery.sequence(), 9);
        assert_eq!(delivery.into_payload(), b"truncate".to_vec());
    }

    #[test]
    fn charged_bytes_follow_truncation() {
        assert_eq!(queued(3).charged_bytes(), 3);
        assert_eq!(queued(11).charged_bytes(), 11);
    }
}
