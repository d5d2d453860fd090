// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus instance and admission pipeline
//!
//! A [`BusInstance`] is one independent message-routing domain: it owns the
//! peer table, the address registry, the sequence counter and the one
//! serialization lock. Instances are plain values with explicit
//! construction and teardown; any number of them coexist in a process.
//!
//! The send path (admission pipeline) is the performance-critical part:
//!
//! 1. take the serialization lock
//! 2. resolve the delivery set ([`crate::core::routing`])
//! 3. apply backpressure against the single gating target, suspending on
//!    its space condvar when the caller asked for blocking semantics
//! 4. stamp the bus-wide sequence number
//! 5. run each target's receive filter and enqueue every surviving copy
//!
//! Steps 2-5 all happen under the lock, which is what guarantees that any
//! two peers sharing overlapping delivery sets observe those messages in
//! identical stamped order. Only the consumer-facing dequeue and the
//! condvar waits run with the lock released.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::metrics::{BusMetrics, MetricsSnapshot};
use super::peer::Peer;
use super::state::{BusState, DEFAULT_MAX_QUEUE_LEN, DEFAULT_SEND_BUDGET};
use super::{Error, Result};
use crate::core::addr::BusAddress;
use crate::core::filter::{Filter, MessageInfo};
use crate::core::message::{Delivery, QueuedMessage};
use crate::core::registry::ConnectionId;
use crate::core::resource::{clone_handles, ResourceHandle};
use crate::core::routing::{self, RouteKind};

// ============================================================================
// Shared core
// ============================================================================

/// State shared between the instance handle and every peer handle.
pub(crate) struct BusShared {
    pub name: String,
    pub state: Mutex<BusState>,
    /// Wakes `accept` callers when a pending connection arrives.
    pub accept_cv: Condvar,
    pub metrics: BusMetrics,
}

impl BusShared {
    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn connect(self: &Arc<Self>) -> Peer {
        let (active, accepted) = {
            let mut state = self.state.lock();
            let pair = state.create_pair();
            state.pending_accepts.push_back(pair.1);
            pair
        };
        self.accept_cv.notify_one();
        Peer::attach(Arc::clone(self), active, accepted)
    }

    pub(crate) fn accept(self: &Arc<Self>, blocking: bool) -> Result<Peer> {
        let mut state = self.state.lock();
        loop {
            if let Some(id) = state.pending_accepts.pop_front() {
                let partner = state.peers.get(&id).map(|p| p.partner).unwrap_or(0);
                log::debug!("[bus] '{}' accepted conn {}", self.name, id);
                return Ok(Peer::attach(Arc::clone(self), id, partner));
            }
            if !blocking {
                return Err(Error::WouldBlock);
            }
            self.accept_cv.wait(&mut state);
        }
    }

    pub(crate) fn close_peer(&self, id: ConnectionId) {
        self.state.lock().close_peer(id);
    }

    // ------------------------------------------------------------------
    // Data path (HOT PATH)
    // ------------------------------------------------------------------

    /// Admit one message: resolve, backpressure, stamp, enqueue.
    pub(crate) fn send(
        &self,
        sender: ConnectionId,
        payload: &[u8],
        handles: &[ResourceHandle],
        dest: Option<BusAddress>,
        blocking: bool,
    ) -> Result<usize> {
        let mut state = self.state.lock();

        // Admission loop: every wakeup re-resolves, because address
        // ownership, join flags and liveness may all have changed while the
        // sender was suspended.
        let route = loop {
            if !state.is_open(sender) {
                return Err(Error::PeerClosed);
            }
            let route = routing::resolve(&state, sender, dest);
            if let RouteKind::Partner(partner) = route.kind {
                if !state.is_open(partner) {
                    return Err(Error::PeerClosed);
                }
            }
            let Some(gate) = route.kind.backpressure_target() else {
                // Fan-out routes are best-effort: never block, never fail.
                break route;
            };
            let target = state.peers.get(&gate).ok_or(Error::PeerClosed)?;
            if !target.queue.could_ever_fit(payload.len()) {
                log::debug!(
                    "[bus] conn {} send rejected: {} bytes > {} byte budget of conn {}",
                    sender,
                    payload.len(),
                    target.queue.max_bytes(),
                    gate
                );
                return Err(Error::MessageTooLarge(payload.len()));
            }
            if target.queue.has_room(payload.len()) {
                break route;
            }
            if !blocking {
                return Err(Error::WouldBlock);
            }
            log::trace!(
                "[bus] conn {} send suspended: conn {} queue full ({} bytes queued)",
                sender,
                gate,
                target.queue.queued_bytes()
            );
            let space_cv = Arc::clone(&target.space_cv);
            space_cv.wait(&mut state);
        };

        let seq = state.stamp();
        BusMetrics::bump(&self.metrics.messages_admitted);

        let sender_addr = BusAddress::new(0, sender);
        let shared_payload: Arc<[u8]> = Arc::from(payload);
        let gate = route.kind.backpressure_target();

        for (idx, target_id) in route.targets.iter().copied().enumerate() {
            let eavesdrop_copy = idx >= route.primary;
            let Some(target) = state.peers.get_mut(&target_id) else {
                continue;
            };
            if target.closed {
                continue;
            }

            let kept = match &target.filter {
                Some(filter) => {
                    let info = MessageInfo {
                        sender: sender_addr,
                        destination: dest,
                        payload,
                    };
                    match filter.keep(&info) {
                        Some(kept) => kept,
                        None => {
                            BusMetrics::bump(&self.metrics.drops_filtered);
                            log::trace!("[bus] seq={} filtered out for conn {}", seq, target_id);
                            continue;
                        }
                    }
                }
                None => payload.len(),
            };

            if !target.queue.has_room(kept) {
                // Room for the gating target was checked in the admission
                // loop and cannot have changed since (same lock hold); this
                // drop path is for best-effort fan-out copies only.
                BusMetrics::bump(&self.metrics.drops_queue_full);
                log::debug!(
                    "[bus] seq={} dropped for conn {}: queue full ({} queued)",
                    seq,
                    target_id,
                    target.queue.len()
                );
                continue;
            }

            let dup_handles = match clone_handles(handles) {
                Ok(dup) => dup,
                Err(err) => {
                    if Some(target_id) == gate {
                        return Err(Error::Io(err));
                    }
                    BusMetrics::bump(&self.metrics.handle_dup_errors);
                    log::debug!(
                        "[bus] seq={} handle dup failed for conn {}: {}",
                        seq,
                        target_id,
                        err
                    );
                    continue;
                }
            };

            target.queue.push(QueuedMessage {
                seq,
                sender: sender_addr,
                destination: dest,
                payload: Arc::clone(&shared_payload),
                kept,
                handles: dup_handles,
            });
            target.data_cv.notify_one();
            BusMetrics::bump(&self.metrics.copies_enqueued);
            if eavesdrop_copy {
                BusMetrics::bump(&self.metrics.eavesdrop_copies);
            }
        }

        Ok(payload.len())
    }

    /// Dequeue the oldest message for `id`, in stamped sequence order.
    pub(crate) fn recv(&self, id: ConnectionId, blocking: bool) -> Result<Delivery> {
        let mut state = self.state.lock();
        loop {
            let Some(peer) = state.peers.get_mut(&id) else {
                return Err(Error::PeerClosed);
            };
            if peer.closed {
                return Err(Error::PeerClosed);
            }
            if let Some(msg) = peer.queue.pop() {
                // Freed budget may unblock senders suspended on this queue.
                let space_cv = Arc::clone(&peer.space_cv);
                space_cv.notify_all();
                BusMetrics::bump(&self.metrics.messages_delivered);
                return Ok(msg.into_delivery());
            }
            let partner = peer.partner;
            let data_cv = Arc::clone(&peer.data_cv);
            if !state.is_open(partner) {
                // Connection torn down and queue drained: end of stream.
                return Err(Error::PeerClosed);
            }
            if !blocking {
                return Err(Error::WouldBlock);
            }
            data_cv.wait(&mut state);
        }
    }

    // ------------------------------------------------------------------
    // Control operations (synchronous, same lock as routing)
    // ------------------------------------------------------------------

    pub(crate) fn join(&self, id: ConnectionId) -> Result<()> {
        let mut state = self.state.lock();
        let peer = state.peers.get_mut(&id).ok_or(Error::PeerClosed)?;
        if peer.closed {
            return Err(Error::PeerClosed);
        }
        if peer.joined {
            return Err(Error::AlreadyJoined);
        }
        peer.joined = true;
        log::debug!("[bus] conn {} joined", id);
        Ok(())
    }

    pub(crate) fn add_address(&self, id: ConnectionId, addr: BusAddress) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_open(id) {
            return Err(Error::PeerClosed);
        }
        state.registry.add(id, addr)?;
        if let Some(peer) = state.peers.get_mut(&id) {
            peer.addresses.insert(addr);
        }
        Ok(())
    }

    pub(crate) fn remove_address(&self, id: ConnectionId, addr: BusAddress) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_open(id) {
            return Err(Error::PeerClosed);
        }
        state.registry.remove(id, addr)?;
        if let Some(peer) = state.peers.get_mut(&id) {
            peer.addresses.remove(&addr);
        }
        Ok(())
    }

    pub(crate) fn set_eavesdrop(&self, id: ConnectionId, on: bool) -> Result<()> {
        let mut state = self.state.lock();
        let peer = state.peers.get_mut(&id).ok_or(Error::PeerClosed)?;
        if peer.closed {
            return Err(Error::PeerClosed);
        }
        peer.eavesdrop = on;
        log::debug!("[bus] conn {} eavesdrop={}", id, on);
        Ok(())
    }

    pub(crate) fn set_filter(&self, id: ConnectionId, filter: Option<Filter>) -> Result<()> {
        let mut state = self.state.lock();
        let peer = state.peers.get_mut(&id).ok_or(Error::PeerClosed)?;
        if peer.closed {
            return Err(Error::PeerClosed);
        }
        peer.filter = filter;
        Ok(())
    }

    pub(crate) fn peer_addresses(&self, id: ConnectionId) -> Vec<BusAddress> {
        let state = self.state.lock();
        state
            .peers
            .get(&id)
            .map(|p| p.addresses.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn peer_flags(&self, id: ConnectionId) -> (bool, bool) {
        let state = self.state.lock();
        state
            .peers
            .get(&id)
            .map(|p| (p.joined, p.eavesdrop))
            .unwrap_or((false, false))
    }
}

// ============================================================================
// Public handle
// ============================================================================

/// One independent message-routing domain.
///
/// Create with [`BusInstance::builder`], connect endpoints with
/// [`connect`](BusInstance::connect) and hand out the accepted sides via
/// [`accept`](BusInstance::accept). Dropping the instance closes pending
/// (never-accepted) connections; already-accepted peers stay live until
/// their handles drop.
pub struct BusInstance {
    shared: Arc<BusShared>,
}

impl BusInstance {
    /// Create an instance with default settings, equivalent to
    /// `BusInstance::builder(name).build()`.
    pub fn new(name: &str) -> Self {
        Self::builder(name).build()
    }

    /// Start configuring a new bus instance.
    ///
    /// # Example
    /// ```
    /// use hbus::BusInstance;
    /// let bus = BusInstance::builder("session")
    ///     .send_budget(64 * 1024)
    ///     .max_queue_len(128)
    ///     .build();
    /// assert_eq!(bus.name(), "session");
    /// ```
    pub fn builder(name: &str) -> BusBuilder {
        BusBuilder::new(name)
    }

    /// Instance name (diagnostics only).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Create a connected peer pair; returns the active side. The accepted
    /// side becomes available through [`accept`](BusInstance::accept).
    pub fn connect(&self) -> Peer {
        self.shared.connect()
    }

    /// Take the next accepted-side peer, blocking until one arrives.
    pub fn accept(&self) -> Result<Peer> {
        self.shared.accept(true)
    }

    /// Non-blocking [`accept`](BusInstance::accept); fails `WouldBlock`
    /// when no connection is pending.
    pub fn try_accept(&self) -> Result<Peer> {
        self.shared.accept(false)
    }

    /// Set the queue byte capacity for peers created from now on.
    /// Already-connected peers keep their budget.
    ///
    /// The budget bounds each peer's *inbound* queue: a point-to-point send
    /// blocks (or fails `WouldBlock`) against the partner's queue, not
    /// against an outbound byte counter on the sender.
    pub fn set_send_budget(&self, bytes: usize) {
        self.shared.state.lock().default_send_budget = bytes;
    }

    /// Set the queue depth cap for peers created from now on.
    pub fn set_max_queue_len(&self, len: usize) {
        self.shared.state.lock().default_max_queue_len = len;
    }

    /// Remove all receive filters installed for `conn` (the match-rule
    /// manager's teardown hook).
    pub fn remove_filters(&self, conn: ConnectionId) -> Result<()> {
        self.shared.set_filter(conn, None)
    }

    /// Snapshot of the instance counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl Drop for BusInstance {
    fn drop(&mut self) {
        // Connections nobody accepted can never be accepted now; close them
        // so their active sides observe end-of-stream.
        let mut state = self.shared.state.lock();
        let pending: Vec<ConnectionId> = state.pending_accepts.drain(..).collect();
        for id in pending {
            state.close_peer(id);
        }
    }
}

impl std::fmt::Debug for BusInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInstance")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for configuring and creating a [`BusInstance`].
pub struct BusBuilder {
    name: String,
    send_budget: usize,
    max_queue_len: usize,
}

impl BusBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            send_budget: DEFAULT_SEND_BUDGET,
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
        }
    }

    /// Default queue byte capacity per peer (default 212992, ~208 KiB).
    pub fn send_budget(mut self, bytes: usize) -> Self {
        self.send_budget = bytes;
        self
    }

    /// Default queue depth cap per peer (default 512 messages).
    pub fn max_queue_len(mut self, len: usize) -> Self {
        self.max_queue_len = len;
        self
    }

    pub fn build(self) -> BusInstance {
        log::debug!(
            "[bus] '{}' created (budget={} max_queue_len={})",
            self.name,
            self.send_budget,
            self.max_queue_len
        );
        BusInstance {
            shared: Arc::new(BusShared {
                name: self.name,
                state: Mutex::new(BusState::new(self.send_budget, self.max_queue_len)),
                accept_cv: Condvar::new(),
                metrics: BusMetrics::new(),
            }),
        }
    }
}
