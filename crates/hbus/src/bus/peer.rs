// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer handle
//!
//! A [`Peer`] is one endpoint of a point-to-point connection on a bus
//! instance. The handle is the unit of ownership: it is not clonable, and
//! dropping it closes the endpoint (releasing owned addresses, discarding
//! queued messages and waking anyone blocked on the connection).
//!
//! Control operations (join, address management, eavesdrop, filters) are
//! synchronous and take effect before the next message is admitted. Data
//! operations come in blocking/non-blocking pairs (`send`/`try_send`,
//! `recv`/`try_recv`), mirroring the socket layer's per-call choice.

use std::sync::Arc;

use super::instance::BusShared;
use super::Result;
use crate::core::addr::BusAddress;
use crate::core::filter::Filter;
use crate::core::message::Delivery;
use crate::core::registry::ConnectionId;
use crate::core::resource::ResourceHandle;

/// One endpoint of a bus connection.
pub struct Peer {
    shared: Arc<BusShared>,
    id: ConnectionId,
    partner: ConnectionId,
}

impl Peer {
    pub(crate) fn attach(shared: Arc<BusShared>, id: ConnectionId, partner: ConnectionId) -> Self {
        Self {
            shared,
            id,
            partner,
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Stable connection id, assigned when the pair was created.
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Connection id of the other endpoint of this connection.
    pub fn partner_id(&self) -> ConnectionId {
        self.partner
    }

    /// This endpoint's default bus address (prefix 0, client id =
    /// connection id); the getsockname seam of the socket adapter.
    pub fn address(&self) -> BusAddress {
        BusAddress::new(0, self.id)
    }

    /// The partner's default bus address; the getpeername seam.
    pub fn peer_address(&self) -> BusAddress {
        BusAddress::new(0, self.partner)
    }

    /// Explicit addresses currently owned by this peer.
    pub fn addresses(&self) -> Vec<BusAddress> {
        self.shared.peer_addresses(self.id)
    }

    /// Whether this peer has joined the bus (multicast/broadcast eligible).
    pub fn joined(&self) -> bool {
        self.shared.peer_flags(self.id).0
    }

    /// Whether promiscuous delivery is enabled.
    pub fn eavesdropping(&self) -> bool {
        self.shared.peer_flags(self.id).1
    }

    // ------------------------------------------------------------------
    // Control operations
    // ------------------------------------------------------------------

    /// Join the bus. Succeeds exactly once per peer lifetime; a second call
    /// fails `AlreadyJoined` without changing state.
    pub fn join(&self) -> Result<()> {
        self.shared.join(self.id)
    }

    /// Bind an explicit (non-wildcard) address to this peer.
    pub fn add_address(&self, addr: BusAddress) -> Result<()> {
        self.shared.add_address(self.id, addr)
    }

    /// Release an address owned by this peer. Traffic to it falls back to
    /// default (partner) routing afterwards.
    pub fn remove_address(&self, addr: BusAddress) -> Result<()> {
        self.shared.remove_address(self.id, addr)
    }

    /// Toggle promiscuous delivery of all bus traffic to this peer.
    pub fn set_eavesdrop(&self, on: bool) -> Result<()> {
        self.shared.set_eavesdrop(self.id, on)
    }

    /// Install (or replace) this peer's receive filter.
    pub fn install_filter(&self, filter: Filter) -> Result<()> {
        self.shared.set_filter(self.id, Some(filter))
    }

    /// Remove the receive filter, if any.
    pub fn clear_filter(&self) -> Result<()> {
        self.shared.set_filter(self.id, None)
    }

    // ------------------------------------------------------------------
    // Data path
    // ------------------------------------------------------------------

    /// Send `payload` to `dest` (`None` = partner), blocking on
    /// backpressure. Returns the number of payload bytes admitted.
    pub fn send(&self, payload: &[u8], dest: Option<BusAddress>) -> Result<usize> {
        self.shared.send(self.id, payload, &[], dest, true)
    }

    /// Non-blocking [`send`](Peer::send); fails `WouldBlock` instead of
    /// suspending.
    pub fn try_send(&self, payload: &[u8], dest: Option<BusAddress>) -> Result<usize> {
        self.shared.send(self.id, payload, &[], dest, false)
    }

    /// Send with attached resource handles. The bus duplicates every handle
    /// at admission; the caller keeps (and may immediately close) its own
    /// copies.
    pub fn send_with_handles(
        &self,
        payload: &[u8],
        handles: &[ResourceHandle],
        dest: Option<BusAddress>,
    ) -> Result<usize> {
        self.shared.send(self.id, payload, handles, dest, true)
    }

    /// Non-blocking [`send_with_handles`](Peer::send_with_handles).
    pub fn try_send_with_handles(
        &self,
        payload: &[u8],
        handles: &[ResourceHandle],
        dest: Option<BusAddress>,
    ) -> Result<usize> {
        self.shared.send(self.id, payload, handles, dest, false)
    }

    /// Receive the oldest queued message, blocking while the queue is
    /// empty. Fails `PeerClosed` once the connection is torn down and the
    /// queue drained (end of stream).
    pub fn recv(&self) -> Result<Delivery> {
        self.shared.recv(self.id, true)
    }

    /// Non-blocking [`recv`](Peer::recv); fails `WouldBlock` when no
    /// message is queued.
    pub fn try_recv(&self) -> Result<Delivery> {
        self.shared.recv(self.id, false)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Close this endpoint. Idempotent; the handle's remaining operations
    /// fail `PeerClosed`, and the partner observes end-of-stream after
    /// draining its queue.
    pub fn close(&self) {
        self.shared.close_peer(self.id);
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.shared.close_peer(self.id);
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("partner", &self.partner)
            .finish_non_exhaustive()
    }
}
