// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive filters
//!
//! A peer may attach one [`Filter`]: a pure function evaluated once per
//! delivery, after routing, at the point of enqueue into that peer's queue.
//! The return value is the number of leading payload bytes to keep; zero
//! drops the message for that peer without any signal to the sender. Other
//! peers in the same delivery set are unaffected.
//!
//! Filters are installed out-of-band (e.g. by a match-rule manager driven
//! over a control channel); the core exposes install/replace/clear on the
//! peer handle and a remove-all hook on the bus, nothing else.

use super::addr::BusAddress;

/// Read-only view of a message handed to a receive filter.
pub struct MessageInfo<'a> {
    /// Default bus address of the sending peer.
    pub sender: BusAddress,
    /// Destination as addressed by the sender (`None` = partner routing).
    pub destination: Option<BusAddress>,
    /// Full admitted payload.
    pub payload: &'a [u8],
}

/// A per-peer receive filter: message -> number of leading bytes to keep.
pub struct Filter {
    func: Box<dyn Fn(&MessageInfo<'_>) -> usize + Send + Sync>,
}

impl Filter {
    /// Wrap a filter function.
    pub fn new(func: impl Fn(&MessageInfo<'_>) -> usize + Send + Sync + 'static) -> Self {
        Self {
            func: Box::new(func),
        }
    }

    /// Evaluate the filter, clamping the verdict to the payload length.
    ///
    /// Returns `None` when the message must be dropped for this peer. A
    /// zero verdict on an empty payload keeps the message: zero bytes is
    /// the whole payload there, so there is nothing to truncate away.
    pub(crate) fn keep(&self, info: &MessageInfo<'_>) -> Option<usize> {
        let kept = (self.func)(info).min(info.payload.len());
        if kept == 0 && !info.payload.is_empty() {
            return None;
        }
        Some(kept)
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(payload: &[u8]) -> MessageInfo<'_> {
        MessageInfo {
            sender: BusAddress::new(0, 1),
            destination: None,
            payload,
        }
    }

    #[test]
    fn verdict_is_clamped_to_payload() {
        let filter = Filter::new(|_| usize::MAX);
        assert_eq!(filter.keep(&info(b"abc")), Some(3));
    }

    #[test]
    fn zero_drops_nonempty_payloads() {
        let filter = Filter::new(|_| 0);
        assert_eq!(filter.keep(&info(b"abc")), None);
        // Empty payloads cannot be truncated further; they pass through.
        assert_eq!(filter.keep(&info(b"")), Some(0));
    }

    #[test]
    fn filter_sees_message_metadata() {
        let filter = Filter::new(|m| if m.destination.is_none() { 1 } else { 2 });
        assert_eq!(filter.keep(&info(b"abcd")), Some(1));
    }
}
