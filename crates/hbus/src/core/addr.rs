// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus address type
//!
//! A [`BusAddress`] is a packed 64-bit value: a 16-bit *prefix* naming an
//! address group and a 48-bit *client id* within that group. Two client-id
//! values are reserved:
//!
//! - all-zero: the bus master / default address of a connection
//! - all-ones: the wildcard, turning the address into a multicast selector
//!   for its prefix (prefix 0 + wildcard = broadcast to every joined peer)
//!
//! Wildcard addresses are never individually owned; they only appear as
//! send destinations.

/// Number of bits in the client-id portion of an address.
pub const CLIENT_BITS: u32 = 48;

/// Number of bits in the prefix portion of an address.
pub const PREFIX_BITS: u32 = 16;

/// Mask covering the 48-bit client-id portion.
pub const CLIENT_MASK: u64 = (1 << CLIENT_BITS) - 1;

/// Reserved client id: multicast/broadcast selector for a prefix.
pub const WILDCARD_CLIENT: u64 = CLIENT_MASK;

/// Reserved client id: the bus's own/master address.
pub const MASTER_CLIENT: u64 = 0;

/// A 64-bit bus address: 16-bit prefix + 48-bit client id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress(u64);

impl BusAddress {
    /// Build an address from a prefix and a client id.
    ///
    /// The client id is masked to its 48-bit field; callers handing in a
    /// wider value keep only the low bits.
    #[inline]
    pub const fn new(prefix: u16, client: u64) -> Self {
        Self(((prefix as u64) << CLIENT_BITS) | (client & CLIENT_MASK))
    }

    /// Reinterpret a raw packed value as an address.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw packed 64-bit value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The 16-bit group prefix.
    #[inline]
    pub const fn prefix(self) -> u16 {
        (self.0 >> CLIENT_BITS) as u16
    }

    /// The 48-bit client id.
    #[inline]
    pub const fn client(self) -> u64 {
        self.0 & CLIENT_MASK
    }

    /// The multicast selector for `prefix` (client id all-ones).
    #[inline]
    pub const fn group(prefix: u16) -> Self {
        Self::new(prefix, WILDCARD_CLIENT)
    }

    /// The broadcast selector (prefix 0, client id all-ones).
    #[inline]
    pub const fn broadcast() -> Self {
        Self::group(0)
    }

    /// True if the client id is the reserved wildcard value.
    #[inline]
    pub const fn is_wildcard(self) -> bool {
        self.client() == WILDCARD_CLIENT
    }

    /// True if this is the broadcast selector (prefix 0 + wildcard).
    #[inline]
    pub const fn is_broadcast(self) -> bool {
        self.prefix() == 0 && self.is_wildcard()
    }

    /// True if the client id is the reserved master value.
    #[inline]
    pub const fn is_master(self) -> bool {
        self.client() == MASTER_CLIENT
    }
}

impl std::fmt::Debug for BusAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BusAddress({:#06x}:{:#x})", self.prefix(), self.client())
    }
}

impl std::fmt::Display for BusAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:012x}", self.prefix(), self.client())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let addr = BusAddress::new(0xBEEF, 0x1234_5678_9ABC);
        assert_eq!(addr.prefix(), 0xBEEF);
        assert_eq!(addr.client(), 0x1234_5678_9ABC);
        assert_eq!(BusAddress::from_raw(addr.raw()), addr);
    }

    #[test]
    fn client_is_masked_to_48_bits() {
        let addr = BusAddress::new(1, u64::MAX);
        assert_eq!(addr.prefix(), 1);
        assert_eq!(addr.client(), WILDCARD_CLIENT);
        assert!(addr.is_wildcard());
        assert!(!addr.is_broadcast());
    }

    #[test]
    fn reserved_values() {
        assert!(BusAddress::broadcast().is_broadcast());
        assert!(BusAddress::group(7).is_wildcard());
        assert!(BusAddress::new(3, MASTER_CLIENT).is_master());
        assert!(!BusAddress::new(3, 42).is_wildcard());
    }

    #[test]
    fn display_is_prefix_colon_client() {
        let addr = BusAddress::new(0x0001, 0x2A);
        assert_eq!(addr.to_string(), "0001:00000000002a");
    }
}
