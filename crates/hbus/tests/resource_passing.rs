// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource (fd) passing tests
//!
//! Handles ride along with the payload: duplicated when the message is
//! admitted, delivered atomically with the bytes they belong to.

use std::io::{Read, Seek, SeekFrom, Write};

use hbus::{BusAddress, BusInstance, Error, Peer, ResourceHandle};

fn pair(bus: &BusInstance) -> (Peer, Peer) {
    let active = bus.connect();
    let accepted = bus.accept().expect("accept");
    (active, accepted)
}

fn temp_with_content(content: &[u8]) -> ResourceHandle {
    let mut file = tempfile::tempfile().expect("tempfile");
    file.write_all(content).expect("write");
    ResourceHandle::from(file)
}

#[test]
fn handle_survives_the_sender_closing_its_copy() {
    let bus = BusInstance::new("resources");
    let (client, service) = pair(&bus);

    let handle = temp_with_content(b"via-bus");
    client
        .send_with_handles(b"here is a file", &[handle], None)
        .expect("send");
    // The sender's copy is gone; the receiver holds an independent dup.

    let mut msg = service.recv().expect("recv");
    assert_eq!(msg.payload(), b"here is a file");
    let handles = msg.take_handles();
    assert_eq!(handles.len(), 1);

    let mut file = handles.into_iter().next().expect("handle").into_file();
    file.seek(SeekFrom::Start(0)).expect("seek");
    let mut content = Vec::new();
    file.read_to_end(&mut content).expect("read");
    assert_eq!(content, b"via-bus");
}

#[test]
fn multiple_handles_arrive_with_their_message() {
    let bus = BusInstance::new("resources");
    let (client, service) = pair(&bus);

    let first = temp_with_content(b"one");
    let second = temp_with_content(b"two");
    client
        .send_with_handles(b"pair", &[first, second], None)
        .expect("send");
    client.send(b"no handles", None).expect("send");

    let mut msg = service.recv().expect("first message");
    assert_eq!(msg.take_handles().len(), 2);
    let mut msg = service.recv().expect("second message");
    assert!(msg.take_handles().is_empty());
}

#[test]
fn each_fanout_target_gets_its_own_duplicate() {
    let bus = BusInstance::new("resources");
    let (sender, _sacc) = pair(&bus);
    let (member_a, _maacc) = pair(&bus);
    let (member_b, _mbacc) = pair(&bus);

    member_a.add_address(BusAddress::new(0x0001, 1)).expect("bind");
    member_a.join().expect("join");
    member_b.add_address(BusAddress::new(0x0001, 2)).expect("bind");
    member_b.join().expect("join");

    let handle = temp_with_content(b"shared");
    sender
        .send_with_handles(b"fanout", &[handle], Some(BusAddress::group(0x0001)))
        .expect("send");

    for member in [&member_a, &member_b] {
        let mut msg = member.recv().expect("member recv");
        let handles = msg.take_handles();
        assert_eq!(handles.len(), 1);
        let mut file = handles.into_iter().next().expect("handle").into_file();
        file.seek(SeekFrom::Start(0)).expect("seek");
        let mut content = Vec::new();
        file.read_to_end(&mut content).expect("read");
        assert_eq!(content, b"shared");
    }
}

#[test]
fn filtered_out_copy_discards_its_handles() {
    let bus = BusInstance::new("resources");
    let (client, service) = pair(&bus);

    service
        .install_filter(hbus::Filter::new(|_| 0))
        .expect("install");

    let handle = temp_with_content(b"unseen");
    client
        .send_with_handles(b"dropped", &[handle], None)
        .expect("send reports success");
    assert!(matches!(service.try_recv(), Err(Error::WouldBlock)));
}

#[test]
fn truncating_filter_keeps_the_handles() {
    let bus = BusInstance::new("resources");
    let (client, service) = pair(&bus);

    service
        .install_filter(hbus::Filter::new(|_| 2))
        .expect("install");

    let handle = temp_with_content(b"kept");
    client
        .send_with_handles(b"payload", &[handle], None)
        .expect("send");

    let mut msg = service.recv().expect("recv");
    assert_eq!(msg.payload(), b"pa");
    assert_eq!(msg.take_handles().len(), 1);
}
