// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Total-order stress tests
//!
//! Two senders multicast into the same group from separate threads while
//! two members drain concurrently. Whatever interleaving the scheduler
//! produces, both members must observe the exact same message order.

use std::thread;
use std::time::Duration;

use hbus::{BusAddress, BusInstance, Peer};

const GROUP_PREFIX: u16 = 0x0077;
const MESSAGES_PER_SENDER: usize = 200;

fn member(bus: &BusInstance, client_id: u64) -> (Peer, Peer) {
    let active = bus.connect();
    let accepted = bus.accept().expect("accept");
    active
        .add_address(BusAddress::new(GROUP_PREFIX, client_id))
        .expect("bind group address");
    active.join().expect("join");
    (active, accepted)
}

fn sender_thread(peer: Peer, tag: u8) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for i in 0..MESSAGES_PER_SENDER {
            let payload = [tag, (i >> 8) as u8, i as u8];
            peer.send(&payload, Some(BusAddress::group(GROUP_PREFIX)))
                .expect("multicast send");
            // Scheduler jitter so the two senders genuinely interleave.
            if fastrand::u8(..) < 32 {
                thread::sleep(Duration::from_micros(u64::from(fastrand::u8(..50))));
            } else if fastrand::bool() {
                thread::yield_now();
            }
        }
    })
}

fn drain_thread(peer: Peer, expected: usize) -> thread::JoinHandle<Vec<(u64, Vec<u8>)>> {
    thread::spawn(move || {
        let mut seen = Vec::with_capacity(expected);
        for _ in 0..expected {
            let msg = peer.recv().expect("member recv");
            seen.push((msg.sequence(), msg.payload().to_vec()));
        }
        seen
    })
}

#[test]
fn concurrent_multicast_senders_yield_identical_order() {
    let bus = BusInstance::new("ordering-stress");

    let (member_a, _ka) = member(&bus, 1);
    let (member_b, _kb) = member(&bus, 2);

    let (sender_x, _kx) = (bus.connect(), bus.accept().expect("accept"));
    let (sender_y, _ky) = (bus.connect(), bus.accept().expect("accept"));

    let total = 2 * MESSAGES_PER_SENDER;
    let drain_a = drain_thread(member_a, total);
    let drain_b = drain_thread(member_b, total);

    let tx_x = sender_thread(sender_x, b'x');
    let tx_y = sender_thread(sender_y, b'y');
    tx_x.join().expect("sender x");
    tx_y.join().expect("sender y");

    let seen_a = drain_a.join().expect("member a");
    let seen_b = drain_b.join().expect("member b");

    assert_eq!(seen_a.len(), total);
    assert_eq!(
        seen_a, seen_b,
        "members of the same group observed different message orders"
    );

    // Sequence numbers are strictly increasing within one peer's stream.
    for pair in seen_a.windows(2) {
        assert!(pair[0].0 < pair[1].0, "sequence went backwards: {:?}", pair);
    }

    // Per sender, payload counters arrive in send order.
    for tag in [b'x', b'y'] {
        let counters: Vec<usize> = seen_a
            .iter()
            .filter(|(_, p)| p[0] == tag)
            .map(|(_, p)| (usize::from(p[1]) << 8) | usize::from(p[2]))
            .collect();
        assert_eq!(counters.len(), MESSAGES_PER_SENDER);
        assert!(
            counters.windows(2).all(|w| w[0] < w[1]),
            "sender {} messages reordered",
            tag as char
        );
    }
}

#[test]
fn partner_and_group_traffic_share_one_order() {
    let bus = BusInstance::new("ordering-stress");

    // One member that also has live partner traffic: the partner stream and
    // the group stream are stamped by the same clock, so sequence numbers
    // stay strictly increasing across both.
    let (member_active, member_accepted) = member(&bus, 9);
    let (group_sender, _k) = (bus.connect(), bus.accept().expect("accept"));

    let tx = thread::spawn(move || {
        for i in 0..100u8 {
            group_sender
                .send(&[b'g', i], Some(BusAddress::group(GROUP_PREFIX)))
                .expect("group send");
        }
    });
    for i in 0..100u8 {
        member_accepted.send(&[b'p', i], None).expect("partner send");
    }
    tx.join().expect("group sender");

    // A fresh bus stamps sequence 0 first, so track the previous sequence
    // as an Option rather than seeding it with a sentinel.
    let mut last_seq: Option<u64> = None;
    for _ in 0..200 {
        let msg = member_active.recv().expect("recv");
        assert!(
            last_seq.is_none_or(|prev| msg.sequence() > prev),
            "sequence did not advance: {:?} then {}",
            last_seq,
            msg.sequence()
        );
        last_seq = Some(msg.sequence());
    }
}
