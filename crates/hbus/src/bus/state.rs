// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lock-guarded bus state
//!
//! Everything the routing engine reads or writes lives in one [`BusState`]
//! behind one `parking_lot::Mutex`: the peer table, the address registry,
//! the sequence counter and the pending-accept queue. Address mutation,
//! join/eavesdrop flags, delivery-set resolution, sequence stamping and
//! enqueue all happen under this single lock; that is the whole total-order
//! argument, so no finer-grained locking here.
//!
//! Per-peer condvars (`data_cv` for blocked receivers, `space_cv` for
//! senders blocked on a full queue) are stored as `Arc<Condvar>` so a waiter
//! can clone the handle out of the state and wait on the one bus mutex.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Condvar;

use crate::core::addr::BusAddress;
use crate::core::filter::Filter;
use crate::core::queue::BoundedQueue;
use crate::core::registry::{AddressRegistry, ConnectionId};

/// Default per-peer queue byte capacity (the kernel's default socket
/// buffer, 208 KiB).
pub const DEFAULT_SEND_BUDGET: usize = 212992;

/// Default per-peer queue depth cap.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 512;

/// One endpoint of a connection, as tracked inside the bus state.
pub(crate) struct PeerState {
    pub id: ConnectionId,
    /// The other endpoint of this point-to-point connection. Always present.
    pub partner: ConnectionId,
    /// False->true exactly once per lifetime; gates multicast/broadcast
    /// eligibility and group selection.
    pub joined: bool,
    /// Promiscuous delivery: a copy of every admitted message.
    pub eavesdrop: bool,
    /// Explicit, non-wildcard addresses owned by this peer (mirror of the
    /// registry, kept for introspection and teardown logging).
    pub addresses: HashSet<BusAddress>,
    pub closed: bool,
    pub queue: BoundedQueue,
    pub filter: Option<Filter>,
    /// Wakes receivers blocked on an empty queue (and on end-of-stream).
    pub data_cv: Arc<Condvar>,
    /// Wakes senders blocked on this peer's full queue.
    pub space_cv: Arc<Condvar>,
}

impl PeerState {
    /// The peer's default bus address: prefix 0, client id = connection id.
    #[inline]
    pub fn address(&self) -> BusAddress {
        BusAddress::new(0, self.id)
    }
}

/// All mutable bus-instance state, guarded by the one serialization lock.
pub(crate) struct BusState {
    pub peers: HashMap<ConnectionId, PeerState>,
    pub registry: AddressRegistry,
    /// Next admission sequence number. Monotonic, never reused.
    pub next_seq: u64,
    /// Next connection id. Starts at 1; client id 0 is the master address.
    next_conn: ConnectionId,
    /// Accepted-side peers waiting for `accept`.
    pub pending_accepts: VecDeque<ConnectionId>,
    /// Queue byte capacity for peers created from now on.
    pub default_send_budget: usize,
    /// Queue depth cap for peers created from now on.
    pub default_max_queue_len: usize,
}

impl BusState {
    pub fn new(default_send_budget: usize, default_max_queue_len: usize) -> Self {
        Self {
            peers: HashMap::new(),
            registry: AddressRegistry::new(),
            next_seq: 0,
            next_conn: 1,
            pending_accepts: VecDeque::new(),
            default_send_budget,
            default_max_queue_len,
        }
    }

    /// Stamp the next admission sequence number.
    #[inline]
    pub fn stamp(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Create a connected peer pair atomically: the active side and its
    /// accepted-side partner. Both inherit the current queue defaults.
    pub fn create_pair(&mut self) -> (ConnectionId, ConnectionId) {
        let active = self.alloc_conn();
        let accepted = self.alloc_conn();
        self.peers.insert(active, self.blank_peer(active, accepted));
        self.peers
            .insert(accepted, self.blank_peer(accepted, active));
        log::debug!("[bus] pair created: active={} accepted={}", active, accepted);
        (active, accepted)
    }

    fn alloc_conn(&mut self) -> ConnectionId {
        let id = self.next_conn;
        self.next_conn += 1;
        id
    }

    fn blank_peer(&self, id: ConnectionId, partner: ConnectionId) -> PeerState {
        PeerState {
            id,
            partner,
            joined: false,
            eavesdrop: false,
            addresses: HashSet::new(),
            closed: false,
            queue: BoundedQueue::new(self.default_send_budget, self.default_max_queue_len),
            filter: None,
            data_cv: Arc::new(Condvar::new()),
            space_cv: Arc::new(Condvar::new()),
        }
    }

    /// Tear down one endpoint: release owned addresses, discard the queue,
    /// wake every blocked sender/receiver involved, and drop the pair's
    /// entries once both sides are closed.
    pub fn close_peer(&mut self, id: ConnectionId) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        if peer.closed {
            return;
        }
        peer.closed = true;
        peer.filter = None;
        peer.addresses.clear();
        let default_addr = peer.address();
        let discarded = peer.queue.clear();
        let partner = peer.partner;
        let data_cv = Arc::clone(&peer.data_cv);
        let space_cv = Arc::clone(&peer.space_cv);

        let released = self.registry.release_all(id);

        // Senders blocked on this queue fail with PeerClosed; receivers on
        // this endpoint likewise. The partner's blocked receiver must wake
        // to observe end-of-stream, and a send of ours suspended on the
        // partner's full queue must wake to fail PeerClosed.
        space_cv.notify_all();
        data_cv.notify_all();
        if let Some(p) = self.peers.get(&partner) {
            p.data_cv.notify_all();
            p.space_cv.notify_all();
        }

        log::debug!(
            "[bus] conn {} ({}) closed: {} queued messages discarded, {} addresses released",
            id,
            default_addr,
            discarded,
            released
        );

        let both_closed = self.peers.get(&partner).is_none_or(|p| p.closed);
        if both_closed {
            self.peers.remove(&id);
            self.peers.remove(&partner);
            self.pending_accepts.retain(|&q| q != id && q != partner);
            log::trace!("[bus] pair {}/{} reaped", id, partner);
        }
    }

    /// Whether `id` refers to a live (non-closed) peer.
    #[inline]
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.peers.get(&id).is_some_and(|p| !p.closed)
    }
}
