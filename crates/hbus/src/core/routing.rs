// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delivery-set resolution
//!
//! For every admitted message the routing engine computes, under the bus
//! serialization lock, the set of peers that receive a copy. Resolution
//! order for an optional destination address:
//!
//! 1. no destination: the sender's point-to-point partner
//! 2. exact, owned, non-wildcard address: that one owner (unicast; the
//!    owner does not need to have joined)
//! 3. wildcard client id: prefix 0 fans out to every joined peer
//!    (broadcast), a non-zero prefix to every joined owner of that prefix
//!    (multicast)
//! 4. present but unowned non-wildcard address: rule 1 fallback (default
//!    routing to the partner)
//!
//! An exact owner always wins over any wildcard interpretation. The primary
//! set is then unioned with every eavesdropping peer except the sender, and
//! duplicates are suppressed so each peer receives at most one copy.
//!
//! This module is pure: it reads the lock-guarded bus state and returns the
//! target list. Sequence stamping and enqueue stay with the caller, which
//! holds the lock across all three steps to preserve the bus-wide total
//! order.

use super::addr::BusAddress;
use super::registry::ConnectionId;
use crate::bus::state::BusState;

/// Which resolution rule produced the primary delivery set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteKind {
    /// Point-to-point to the sender's partner (rule 1 or the rule 4
    /// fallback). Carries the partner's connection id.
    Partner(ConnectionId),
    /// Exact owned address (rule 2).
    Unicast(ConnectionId),
    /// Wildcard with a non-zero prefix (rule 3, multicast group).
    Group(u16),
    /// Wildcard with prefix 0 (rule 3, every joined peer).
    Broadcast,
}

impl RouteKind {
    /// The single target whose queue exerts backpressure on the sender.
    ///
    /// Fan-out routes are best-effort and never block, so only the
    /// point-to-point kinds answer.
    pub fn backpressure_target(self) -> Option<ConnectionId> {
        match self {
            RouteKind::Partner(id) | RouteKind::Unicast(id) => Some(id),
            RouteKind::Group(_) | RouteKind::Broadcast => None,
        }
    }
}

/// Resolved delivery set for one message.
pub(crate) struct Route {
    pub kind: RouteKind,
    /// Primary targets plus eavesdroppers, deduplicated. The first
    /// `primary` entries came from rules 1-4; the rest are eavesdrop-only.
    pub targets: Vec<ConnectionId>,
    pub primary: usize,
}

/// Compute the delivery set for `sender` addressing `dest`.
///
/// Must be called with the bus serialization lock held; the result is only
/// valid until the lock is released.
pub(crate) fn resolve(state: &BusState, sender: ConnectionId, dest: Option<BusAddress>) -> Route {
    let (kind, mut targets) = primary_set(state, sender, dest);
    let primary = targets.len();

    // Union with eavesdroppers; a sender never eavesdrops on its own send,
    // and a peer already in the primary set gets no second copy.
    for peer in state.peers.values() {
        if peer.eavesdrop && !peer.closed && peer.id != sender && !targets.contains(&peer.id) {
            targets.push(peer.id);
        }
    }

    log::trace!(
        "[route] sender={} dest={:?} kind={:?} fanout={}",
        sender,
        dest,
        kind,
        targets.len()
    );

    Route {
        kind,
        targets,
        primary,
    }
}

fn primary_set(
    state: &BusState,
    sender: ConnectionId,
    dest: Option<BusAddress>,
) -> (RouteKind, Vec<ConnectionId>) {
    let partner_route = |state: &BusState| {
        let partner = state
            .peers
            .get(&sender)
            .map(|p| p.partner)
            .unwrap_or(ConnectionId::MAX);
        let targets = match state.peers.get(&partner) {
            Some(p) if !p.closed => vec![partner],
            _ => Vec::new(),
        };
        (RouteKind::Partner(partner), targets)
    };

    let Some(addr) = dest else {
        return partner_route(state);
    };

    if addr.is_wildcard() {
        if addr.prefix() == 0 {
            // Broadcast: every joined peer, the sender included when joined.
            let targets = state
                .peers
                .values()
                .filter(|p| p.joined && !p.closed)
                .map(|p| p.id)
                .collect();
            return (RouteKind::Broadcast, targets);
        }
        // Multicast: joined owners of at least one address under the prefix.
        let mut targets: Vec<ConnectionId> = state
            .registry
            .lookup_group(addr.prefix())
            .filter(|id| state.peers.get(id).is_some_and(|p| p.joined && !p.closed))
            .collect();
        targets.sort_unstable();
        return (RouteKind::Group(addr.prefix()), targets);
    }

    if let Some(owner) = state.registry.lookup_exact(addr) {
        return (RouteKind::Unicast(owner), vec![owner]);
    }

    // Unowned non-wildcard destination: default routing to the partner.
    partner_route(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::state::{BusState, DEFAULT_MAX_QUEUE_LEN, DEFAULT_SEND_BUDGET};

    fn state_with_pairs(pairs: usize) -> (BusState, Vec<ConnectionId>) {
        let mut state = BusState::new(DEFAULT_SEND_BUDGET, DEFAULT_MAX_QUEUE_LEN);
        let mut active = Vec::new();
        for _ in 0..pairs {
            let (a, _b) = state.create_pair();
            active.push(a);
        }
        (state, active)
    }

    fn join(state: &mut BusState, id: ConnectionId) {
        state.peers.get_mut(&id).expect("peer").joined = true;
    }

    #[test]
    fn no_destination_routes_to_partner() {
        let (state, ids) = state_with_pairs(2);
        let route = resolve(&state, ids[0], None);
        let partner = state.peers[&ids[0]].partner;
        assert_eq!(route.kind, RouteKind::Partner(partner));
        assert_eq!(route.targets, vec![partner]);
    }

    #[test]
    fn unowned_destination_falls_back_to_partner() {
        let (state, ids) = state_with_pairs(2);
        let route = resolve(&state, ids[0], Some(BusAddress::new(9, 9)));
        assert_eq!(route.kind, RouteKind::Partner(state.peers[&ids[0]].partner));
    }

    #[test]
    fn exact_owner_wins_unicast() {
        let (mut state, ids) = state_with_pairs(2);
        let addr = BusAddress::new(3, 77);
        state.registry.add(ids[1], addr).expect("bind");
        let route = resolve(&state, ids[0], Some(addr));
        assert_eq!(route.kind, RouteKind::Unicast(ids[1]));
        assert_eq!(route.targets, vec![ids[1]]);
    }

    #[test]
    fn unicast_does_not_require_join() {
        let (mut state, ids) = state_with_pairs(2);
        let addr = BusAddress::new(3, 77);
        state.registry.add(ids[1], addr).expect("bind");
        assert!(!state.peers[&ids[1]].joined);
        let route = resolve(&state, ids[0], Some(addr));
        assert_eq!(route.targets, vec![ids[1]]);
    }

    #[test]
    fn group_wildcard_selects_joined_prefix_owners() {
        let (mut state, ids) = state_with_pairs(3);
        state.registry.add(ids[1], BusAddress::new(5, 1)).expect("bind");
        state.registry.add(ids[2], BusAddress::new(5, 2)).expect("bind");
        join(&mut state, ids[1]);
        // ids[2] owns the prefix but never joined: not selected.

        let route = resolve(&state, ids[0], Some(BusAddress::group(5)));
        assert_eq!(route.kind, RouteKind::Group(5));
        assert_eq!(route.targets, vec![ids[1]]);
    }

    #[test]
    fn broadcast_reaches_every_joined_peer() {
        let (mut state, ids) = state_with_pairs(3);
        join(&mut state, ids[0]);
        join(&mut state, ids[2]);

        let route = resolve(&state, ids[0], Some(BusAddress::broadcast()));
        assert_eq!(route.kind, RouteKind::Broadcast);
        let mut targets = route.targets;
        targets.sort_unstable();
        // Sender is joined, so it receives its own broadcast; ids[1] never
        // joined and is excluded.
        let mut expected = vec![ids[0], ids[2]];
        expected.sort_unstable();
        assert_eq!(targets, expected);
    }

    #[test]
    fn eavesdroppers_are_unioned_without_duplicates() {
        let (mut state, ids) = state_with_pairs(3);
        let addr = BusAddress::new(2, 10);
        state.registry.add(ids[1], addr).expect("bind");
        state.peers.get_mut(&ids[1]).expect("peer").eavesdrop = true;
        state.peers.get_mut(&ids[2]).expect("peer").eavesdrop = true;

        let route = resolve(&state, ids[0], Some(addr));
        // ids[1] is the unicast target and an eavesdropper: one copy only.
        assert_eq!(route.targets.len(), 2);
        assert!(route.targets.contains(&ids[1]));
        assert!(route.targets.contains(&ids[2]));
    }

    #[test]
    fn sender_never_eavesdrops_its_own_send() {
        let (mut state, ids) = state_with_pairs(2);
        state.peers.get_mut(&ids[0]).expect("peer").eavesdrop = true;
        let route = resolve(&state, ids[0], None);
        assert!(!route.targets.contains(&ids[0]));
    }
}
