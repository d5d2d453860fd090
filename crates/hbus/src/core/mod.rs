// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Core Bus Components
//!
//! Leaf building blocks composed by [`crate::bus`]:
//!
//! | Module | Description |
//! |--------|-------------|
//! | `addr` | 64-bit bus addresses (16-bit prefix / 48-bit client id) |
//! | `registry` | Address ownership table + per-prefix fan-out index |
//! | `queue` | Bounded per-peer receive queue (bytes + count) |
//! | `routing` | Delivery-set resolution under the serialization lock |
//! | `message` | Queued message copies and consumer-facing deliveries |
//! | `resource` | Out-of-band fd handles, duplicated per delivery |
//! | `filter` | Per-peer receive filters (truncate or drop) |
//!
//! Most users should use the high-level [`crate::bus`] API instead of
//! interacting with core modules directly.

/// Bus address type and reserved client-id constants.
pub mod addr;
/// Receive filter contract and application.
pub mod filter;
/// Message and delivery representations.
pub mod message;
pub(crate) mod queue;
/// Address ownership registry.
pub mod registry;
/// Out-of-band resource (fd) handles.
pub mod resource;
pub(crate) mod routing;
