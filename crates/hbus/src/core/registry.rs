// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address registry
//!
//! Maps explicit (non-wildcard) bus addresses to their owning connection and
//! enforces single ownership: at most one peer owns a given address at any
//! instant, bus-wide. A per-prefix index serves multicast fan-out lookups.
//!
//! The registry has no lock of its own. It lives inside the bus state and is
//! mutated only under the single serialization lock, which is what makes the
//! check-then-set in [`AddressRegistry::add`] race-free.

use std::collections::HashMap;

use super::addr::BusAddress;
use crate::bus::{Error, Result};

/// Stable identifier of one connection endpoint within a bus instance.
pub type ConnectionId = u64;

/// Bus-wide address ownership table with a per-prefix fan-out index.
#[derive(Default)]
pub struct AddressRegistry {
    /// Exact address -> owning connection.
    exact: HashMap<BusAddress, ConnectionId>,
    /// Prefix -> owners, refcounted per owned address under that prefix.
    by_prefix: HashMap<u16, HashMap<ConnectionId, u32>>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `addr` to `owner`.
    ///
    /// Idempotent when `owner` already holds the address. Wildcard client
    /// ids are never individually owned.
    pub fn add(&mut self, owner: ConnectionId, addr: BusAddress) -> Result<()> {
        if addr.is_wildcard() {
            return Err(Error::ReservedAddress(addr));
        }
        match self.exact.get(&addr) {
            Some(&held) if held == owner => return Ok(()),
            Some(_) => return Err(Error::AddressInUse(addr)),
            None => {}
        }
        self.exact.insert(addr, owner);
        *self
            .by_prefix
            .entry(addr.prefix())
            .or_default()
            .entry(owner)
            .or_insert(0) += 1;
        log::debug!("[registry] bind {} -> conn {}", addr, owner);
        Ok(())
    }

    /// Unbind `addr` from `owner`; fails unless `owner` currently holds it.
    pub fn remove(&mut self, owner: ConnectionId, addr: BusAddress) -> Result<()> {
        match self.exact.get(&addr) {
            Some(&held) if held == owner => {}
            _ => return Err(Error::NotOwner(addr)),
        }
        self.exact.remove(&addr);
        self.unindex(owner, addr.prefix());
        log::debug!("[registry] unbind {} from conn {}", addr, owner);
        Ok(())
    }

    /// The connection owning exactly `addr`, if any.
    pub fn lookup_exact(&self, addr: BusAddress) -> Option<ConnectionId> {
        self.exact.get(&addr).copied()
    }

    /// Connections owning at least one address under `prefix`.
    pub fn lookup_group(&self, prefix: u16) -> impl Iterator<Item = ConnectionId> + '_ {
        self.by_prefix
            .get(&prefix)
            .into_iter()
            .flat_map(|owners| owners.keys().copied())
    }

    /// Release every address held by `owner` (connection teardown).
    ///
    /// Returns the number of addresses released.
    pub fn release_all(&mut self, owner: ConnectionId) -> usize {
        let owned: Vec<BusAddress> = self
            .exact
            .iter()
            .filter(|(_, &held)| held == owner)
            .map(|(&addr, _)| addr)
            .collect();
        for addr in &owned {
            self.exact.remove(addr);
            self.unindex(owner, addr.prefix());
        }
        if !owned.is_empty() {
            log::debug!("[registry] released {} addresses of conn {}", owned.len(), owner);
        }
        owned.len()
    }

    fn unindex(&mut self, owner: ConnectionId, prefix: u16) {
        if let Some(owners) = self.by_prefix.get_mut(&prefix) {
            if let Some(count) = owners.get_mut(&owner) {
                *count -= 1;
                if *count == 0 {
                    owners.remove(&owner);
                }
            }
            if owners.is_empty() {
                self.by_prefix.remove(&prefix);
            }
        }
    }
}
