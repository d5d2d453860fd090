// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HBUS - Connection-oriented local message bus
//!
//! A pure Rust, in-process IPC bus layering unicast, multicast, broadcast,
//! passive eavesdropping, per-endpoint backpressure, out-of-band resource
//! (fd) transfer and attachable receive filters on top of ordinary
//! point-to-point peer connections.
//!
//! ## Quick Start
//!
//! ```
//! use hbus::{BusAddress, BusInstance};
//!
//! let bus = BusInstance::builder("session").build();
//!
//! // Point-to-point: connect() returns the active side, accept() the other.
//! let client = bus.connect();
//! let service = bus.accept()?;
//!
//! // Address-routed unicast after explicit registration.
//! service.add_address(BusAddress::new(0x0001, 42))?;
//! client.send(b"ping", Some(BusAddress::new(0x0001, 42)))?;
//! assert_eq!(service.recv()?.payload(), b"ping");
//! # Ok::<(), hbus::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                  Socket / match-rule adapters                 |
//! |      (external: bind/listen/accept, filter management)        |
//! +---------------------------------------------------------------+
//! |                          Bus Layer                            |
//! |        BusInstance | Peer handles | control operations        |
//! +---------------------------------------------------------------+
//! |                         Core Layer                            |
//! | AddressRegistry | RoutingEngine | BoundedQueue | Filters | fd |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BusInstance`] | One independent routing domain, factory for peers |
//! | [`Peer`] | One endpoint of a connection; data + control operations |
//! | [`BusAddress`] | 16-bit prefix + 48-bit client id, wildcard-aware |
//! | [`Delivery`] | A received message: payload, sender, handles |
//! | [`Filter`] | Per-peer receive filter (truncate or drop) |
//!
//! ## Guarantees
//!
//! - A non-wildcard address is owned by at most one peer at any instant.
//! - Every admitted message carries a bus-wide monotonic sequence number;
//!   peers sharing overlapping delivery sets observe identical order.
//! - Resource handles are duplicated at admission and delivered atomically
//!   with their payload.

/// Bus address type and reserved-value constants.
pub use crate::core::addr::{BusAddress, CLIENT_BITS, MASTER_CLIENT, PREFIX_BITS, WILDCARD_CLIENT};
pub use crate::core::filter::{Filter, MessageInfo};
pub use crate::core::message::Delivery;
pub use crate::core::registry::{AddressRegistry, ConnectionId};
pub use crate::core::resource::ResourceHandle;
pub use bus::{
    BusBuilder, BusInstance, BusMetrics, Error, MetricsSnapshot, Peer, Result,
    DEFAULT_MAX_QUEUE_LEN, DEFAULT_SEND_BUDGET,
};

/// High-level bus API (BusInstance, Peer, errors).
pub mod bus;
/// Core building blocks (addresses, registry, queueing, routing).
pub mod core;
