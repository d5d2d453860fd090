// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Bus API
//!
//! The public surface of hbus: [`BusInstance`] (one routing domain),
//! [`Peer`] (one connection endpoint) and the error taxonomy.
//!
//! ## Quick Start
//!
//! ```
//! use hbus::{BusInstance, BusAddress};
//!
//! let bus = BusInstance::new("session");
//! let client = bus.connect();
//! let server = bus.accept()?;
//!
//! client.send(b"hello", None)?;
//! let msg = server.recv()?;
//! assert_eq!(msg.payload(), b"hello");
//! # Ok::<(), hbus::Error>(())
//! ```
//!
//! ## Entity Hierarchy
//!
//! ```text
//! BusInstance
//! +-- Peer (active side)   <---- connect()
//! +-- Peer (accepted side) <---- accept()
//!     +-- bound addresses, receive queue, optional filter
//! ```

mod instance;
mod metrics;
mod peer;
pub(crate) mod state;

pub use instance::{BusBuilder, BusInstance};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use peer::Peer;
pub use state::{DEFAULT_MAX_QUEUE_LEN, DEFAULT_SEND_BUDGET};

use crate::core::addr::BusAddress;

/// Errors returned by hbus operations.
///
/// Every variant is recoverable by the caller; the bus has no internal
/// retry policy. Callers decide whether to retry with blocking semantics
/// or back off.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Address ownership
    // ========================================================================
    /// The address is already owned by a different peer.
    AddressInUse(BusAddress),
    /// Removing an address this peer does not own.
    NotOwner(BusAddress),
    /// The wildcard client id can never be individually owned.
    ReservedAddress(BusAddress),

    // ========================================================================
    // Peer state
    // ========================================================================
    /// Second `join` on an already-joined peer; state is unchanged.
    AlreadyJoined,
    /// Operation against a torn-down connection, or end of stream on
    /// receive after the partner closed.
    PeerClosed,

    // ========================================================================
    // Data path
    // ========================================================================
    /// Non-blocking send with no queue room, or non-blocking receive/accept
    /// with nothing pending.
    WouldBlock,
    /// Payload exceeds the target queue's byte capacity even when empty;
    /// blocking would never succeed.
    MessageTooLarge(usize),
    /// Resource handle duplication failed at the OS level.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AddressInUse(addr) => write!(f, "Address in use: {}", addr),
            Error::NotOwner(addr) => write!(f, "Address not owned by this peer: {}", addr),
            Error::ReservedAddress(addr) => write!(f, "Reserved address cannot be owned: {}", addr),
            Error::AlreadyJoined => write!(f, "Peer already joined the bus"),
            Error::PeerClosed => write!(f, "Peer connection closed"),
            Error::WouldBlock => write!(f, "Operation would block"),
            Error::MessageTooLarge(len) => {
                write!(f, "Message of {} bytes exceeds queue capacity", len)
            }
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
