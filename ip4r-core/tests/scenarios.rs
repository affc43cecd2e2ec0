//
// scenarios.rs - End-to-End Dataplane Scenarios
//
// Purpose:
//   Drives the router core through the full set of dataplane situations over a
//   scripted mock link: echo replies, forwarding with and without a resolved
//   next hop, ARP request/reply handling, TTL expiry and unroutable
//   destinations. Every emitted frame is independently re-parsed with
//   etherparse before its fields are checked.
//

use etherparse::icmpv4::{DestUnreachableHeader, TimeExceededCode};
use etherparse::{Icmpv4Type, IcmpEchoHeader, PacketBuilder};
use ip4r_core::wire::{self, ArpHeader};
use ip4r_core::{checksum, IcmpKind, LinkLayer, NextHop, Rib, Route, Router};
use std::io;
use std::net::Ipv4Addr;

/// A scripted link layer: fixed interface addresses, every transmitted frame
/// captured for inspection.
struct MockLink {
    ifaces: Vec<(Ipv4Addr, [u8; 6])>,
    sent: Vec<(u32, Vec<u8>)>,
}

impl MockLink {
    fn new(ifaces: &[(Ipv4Addr, [u8; 6])]) -> Self {
        MockLink {
            ifaces: ifaces.to_vec(),
            sent: Vec::new(),
        }
    }
}

impl LinkLayer for MockLink {
    fn recv_any(&mut self, _buf: &mut [u8]) -> io::Result<(usize, u32)> {
        Err(io::Error::other("mock link has no live receive"))
    }

    fn send(&mut self, if_index: u32, frame: &[u8]) -> io::Result<usize> {
        self.sent.push((if_index, frame.to_vec()));
        Ok(frame.len())
    }

    fn ipv4(&self, if_index: u32) -> Ipv4Addr {
        self.ifaces[if_index as usize].0
    }

    fn mac(&self, if_index: u32) -> [u8; 6] {
        self.ifaces[if_index as usize].1
    }
}

const IFACE0_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);
const IFACE1_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 254);
const HOST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 99);
const GATEWAY_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

fn mac(s: &str) -> [u8; 6] {
    eui48::MacAddress::parse_str(s).unwrap().to_array()
}

fn iface0_mac() -> [u8; 6] {
    mac("02:00:00:00:00:01")
}

fn iface1_mac() -> [u8; 6] {
    mac("02:00:00:00:00:02")
}

fn host_mac() -> [u8; 6] {
    mac("0a:00:27:00:00:09")
}

fn new_router() -> Router<MockLink> {
    let _ = env_logger::builder().is_test(true).try_init();
    let link = MockLink::new(&[(IFACE0_IP, iface0_mac()), (IFACE1_IP, iface1_mac())]);
    Router::new(link, Rib::new())
}

fn forwarding_router() -> Router<MockLink> {
    let mut router = new_router();
    router.rib.insert(&Route {
        prefix: Ipv4Addr::new(10, 0, 0, 0),
        mask: Ipv4Addr::new(255, 255, 255, 0),
        next_hop: GATEWAY_IP,
        if_index: 1,
    });
    router
}

fn echo_request_frame(daddr: Ipv4Addr, ttl: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(host_mac(), iface0_mac())
        .ipv4(HOST_IP.octets(), daddr.octets(), ttl)
        .icmpv4_echo_request(1, 7);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn udp_frame(daddr: Ipv4Addr, ttl: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(host_mac(), iface0_mac())
        .ipv4(HOST_IP.octets(), daddr.octets(), ttl)
        .udp(4000, 4001);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn arp_frame(eth_src: [u8; 6], eth_dst: [u8; 6], hdr: &ArpHeader) -> Vec<u8> {
    let mut frame = vec![0u8; wire::ARP_FRAME_LEN];
    wire::eth::set_dst(&mut frame, &eth_dst);
    wire::eth::set_src(&mut frame, &eth_src);
    wire::eth::set_ethertype(&mut frame, wire::ETHERTYPE_ARP);
    hdr.write(&mut frame[wire::eth::LEN..]);
    frame
}

/// Recomputing the IPv4 header checksum with the field zeroed must
/// reproduce the stored field.
fn assert_ipv4_checksum_valid(frame: &[u8]) {
    let stored = wire::ipv4::checksum(frame);
    let mut header = wire::ipv4::header(frame);
    header[10] = 0;
    header[11] = 0;
    assert_eq!(checksum::internet(&header), stored, "IPv4 checksum invalid");
}

/// The router's ICMP checksum covers the 8 header bytes.
fn assert_icmp_checksum_valid(frame: &[u8]) {
    let stored = wire::icmp::checksum(frame);
    let mut header = wire::icmp::header(frame);
    header[2] = 0;
    header[3] = 0;
    assert_eq!(checksum::internet(&header), stored, "ICMP checksum invalid");
}

// S1 - an echo request addressed to the ingress interface is answered in
// place, payload preserved.
#[test]
fn echo_request_gets_echo_reply() {
    let mut router = new_router();
    let request = echo_request_frame(IFACE0_IP, 64, b"abc");
    router.handle_frame(&request, 0).unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, reply) = &router.link.sent[0];
    assert_eq!(*egress, 0);
    assert_eq!(reply.len(), request.len());
    assert_eq!(wire::eth::dst(reply), host_mac());
    assert_eq!(wire::eth::src(reply), iface0_mac());

    let parsed = etherparse::SlicedPacket::from_ethernet(reply).unwrap();
    let ip = match parsed.net.unwrap() {
        etherparse::NetSlice::Ipv4(ip) => ip,
        other => panic!("not IPv4: {other:?}"),
    };
    assert_eq!(ip.header().source(), IFACE0_IP.octets());
    assert_eq!(ip.header().destination(), HOST_IP.octets());
    assert_eq!(ip.header().ttl(), 64);
    let icmp = match parsed.transport.unwrap() {
        etherparse::TransportSlice::Icmpv4(icmp) => icmp,
        other => panic!("not ICMPv4: {other:?}"),
    };
    assert_eq!(
        icmp.icmp_type(),
        Icmpv4Type::EchoReply(IcmpEchoHeader { id: 1, seq: 7 })
    );
    assert_eq!(icmp.payload(), b"abc");

    assert_ipv4_checksum_valid(reply);
    assert_icmp_checksum_valid(reply);
}

// A datagram for the router that is not an echo request is dropped.
#[test]
fn local_delivery_of_non_echo_is_dropped() {
    let mut router = new_router();
    let frame = udp_frame(IFACE0_IP, 64, b"not for forwarding");
    router.handle_frame(&frame, 0).unwrap();
    assert!(router.link.sent.is_empty());
}

// S2 - forwarding with a cached next-hop MAC rewrites the Ethernet header,
// decrements the TTL and patches the checksum.
#[test]
fn forward_with_cached_neighbor() {
    let cached = mac("00:11:22:33:44:55");
    let mut router = forwarding_router();
    router.neighbors.insert(GATEWAY_IP, cached);

    let frame = udp_frame(Ipv4Addr::new(10, 0, 0, 7), 10, b"hello");
    router.handle_frame(&frame, 0).unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, sent) = &router.link.sent[0];
    assert_eq!(*egress, 1);
    assert_eq!(wire::eth::dst(sent), cached);
    assert_eq!(wire::eth::src(sent), iface1_mac());

    let parsed = etherparse::SlicedPacket::from_ethernet(sent).unwrap();
    let ip = match parsed.net.unwrap() {
        etherparse::NetSlice::Ipv4(ip) => ip,
        other => panic!("not IPv4: {other:?}"),
    };
    assert_eq!(ip.header().ttl(), 9);
    assert_eq!(ip.header().source(), HOST_IP.octets());
    assert_eq!(ip.header().destination(), [10, 0, 0, 7]);
    assert_ipv4_checksum_valid(sent);
    // Everything behind the IP header is untouched.
    let payload_off = wire::ipv4::OFFSET + wire::ipv4::LEN;
    assert_eq!(sent[payload_off..], frame[payload_off..]);
}

// S3 - a cache miss parks the packet and broadcasts exactly one ARP request;
// the reply releases every parked packet in order.
#[test]
fn forward_with_arp_miss_then_reply() {
    let mut router = forwarding_router();

    router
        .handle_frame(&udp_frame(Ipv4Addr::new(10, 0, 0, 7), 10, b"first"), 0)
        .unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, request) = &router.link.sent[0];
    assert_eq!(*egress, 1);
    assert_eq!(wire::eth::dst(request), wire::BROADCAST_MAC);
    assert_eq!(wire::eth::src(request), iface1_mac());
    assert_eq!(wire::eth::ethertype(request), wire::ETHERTYPE_ARP);
    assert_eq!(request.len(), wire::ARP_FRAME_LEN);
    let arp = ArpHeader::parse(&request[wire::eth::LEN..]).unwrap();
    assert_eq!(arp.op, wire::ARP_OP_REQUEST);
    assert_eq!(arp.sha, iface1_mac());
    assert_eq!(arp.spa, IFACE1_IP);
    assert_eq!(arp.tha, [0; 6]);
    assert_eq!(arp.tpa, GATEWAY_IP);
    assert_eq!(router.pending.len(), 1);

    // A second packet for the same next hop parks without a duplicate
    // request.
    router
        .handle_frame(&udp_frame(Ipv4Addr::new(10, 0, 0, 8), 7, b"second"), 0)
        .unwrap();
    assert_eq!(router.link.sent.len(), 1);
    assert_eq!(router.pending.len(), 2);

    let gateway_mac = mac("aa:bb:cc:dd:ee:ff");
    let reply = arp_frame(
        gateway_mac,
        iface1_mac(),
        &ArpHeader {
            op: wire::ARP_OP_REPLY,
            sha: gateway_mac,
            spa: GATEWAY_IP,
            tha: iface1_mac(),
            tpa: IFACE1_IP,
        },
    );
    router.handle_frame(&reply, 1).unwrap();

    assert_eq!(router.neighbors.lookup(GATEWAY_IP), Some(gateway_mac));
    assert!(router.pending.is_empty());
    assert!(router.requested.is_empty());
    assert_eq!(router.link.sent.len(), 3);
    for ((egress, released), expected_ttl) in router.link.sent[1..].iter().zip([9u8, 6]) {
        assert_eq!(*egress, 1);
        assert_eq!(wire::eth::dst(released), gateway_mac);
        assert_eq!(wire::eth::src(released), iface1_mac());
        assert_eq!(wire::eth::ethertype(released), wire::ETHERTYPE_IPV4);
        assert_eq!(wire::ipv4::ttl(released), expected_ttl);
        assert_ipv4_checksum_valid(released);
    }
}

// S4 - TTL 1 on the forward path turns into a Time Exceeded back out the
// ingress interface, quoting the offending datagram.
#[test]
fn ttl_expiry_sends_time_exceeded() {
    let mut router = forwarding_router();
    router.neighbors.insert(GATEWAY_IP, mac("00:11:22:33:44:55"));

    let frame = udp_frame(Ipv4Addr::new(10, 0, 0, 7), 1, b"hello");
    router.handle_frame(&frame, 0).unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, sent) = &router.link.sent[0];
    assert_eq!(*egress, 0);
    assert_icmp_response(sent, &frame);
    let parsed = etherparse::SlicedPacket::from_ethernet(sent).unwrap();
    match parsed.transport.unwrap() {
        etherparse::TransportSlice::Icmpv4(icmp) => assert_eq!(
            icmp.icmp_type(),
            Icmpv4Type::TimeExceeded(TimeExceededCode::TtlExceededInTransit)
        ),
        other => panic!("not ICMPv4: {other:?}"),
    }
}

// S5 - no route at all turns into a Destination Unreachable with the same
// quotation.
#[test]
fn no_route_sends_destination_unreachable() {
    let mut router = new_router();

    let frame = udp_frame(Ipv4Addr::new(10, 0, 0, 7), 10, b"hello");
    router.handle_frame(&frame, 0).unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, sent) = &router.link.sent[0];
    assert_eq!(*egress, 0);
    assert_icmp_response(sent, &frame);
    let parsed = etherparse::SlicedPacket::from_ethernet(sent).unwrap();
    match parsed.transport.unwrap() {
        etherparse::TransportSlice::Icmpv4(icmp) => assert_eq!(
            icmp.icmp_type(),
            Icmpv4Type::DestinationUnreachable(DestUnreachableHeader::Network)
        ),
        other => panic!("not ICMPv4: {other:?}"),
    }
}

/// Common assertions for the two ICMP error responses: addressed back to the
/// original sender, fresh TTL, and the offending datagram's first 28 bytes
/// quoted behind the ICMP header.
fn assert_icmp_response(sent: &[u8], original: &[u8]) {
    assert_eq!(
        sent.len(),
        wire::icmp::OFFSET + wire::icmp::LEN + wire::icmp::QUOTE_LEN
    );
    assert_eq!(wire::eth::dst(sent), host_mac());
    assert_eq!(wire::eth::src(sent), iface0_mac());
    assert_eq!(wire::ipv4::saddr(sent), IFACE0_IP);
    assert_eq!(wire::ipv4::daddr(sent), HOST_IP);
    assert_eq!(wire::ipv4::ttl(sent), 64);
    assert_eq!(
        wire::ipv4::tot_len(sent) as usize,
        wire::ipv4::LEN + wire::icmp::LEN + wire::icmp::QUOTE_LEN
    );
    assert_ipv4_checksum_valid(sent);
    assert_icmp_checksum_valid(sent);
    let quote = &sent[wire::icmp::OFFSET + wire::icmp::LEN..];
    assert_eq!(
        quote,
        &original[wire::ipv4::OFFSET..wire::ipv4::OFFSET + wire::icmp::QUOTE_LEN]
    );
}

// S6 - an ARP request for the ingress interface's address is answered
// without touching the neighbor cache.
#[test]
fn arp_request_for_us_gets_reply() {
    let mut router = new_router();
    let request = arp_frame(
        host_mac(),
        wire::BROADCAST_MAC,
        &ArpHeader {
            op: wire::ARP_OP_REQUEST,
            sha: host_mac(),
            spa: HOST_IP,
            tha: [0; 6],
            tpa: IFACE0_IP,
        },
    );
    router.handle_frame(&request, 0).unwrap();

    assert_eq!(router.link.sent.len(), 1);
    let (egress, reply) = &router.link.sent[0];
    assert_eq!(*egress, 0);
    assert_eq!(wire::eth::dst(reply), host_mac());
    assert_eq!(wire::eth::src(reply), iface0_mac());
    let arp = ArpHeader::parse(&reply[wire::eth::LEN..]).unwrap();
    assert_eq!(arp.op, wire::ARP_OP_REPLY);
    assert_eq!(arp.sha, iface0_mac());
    assert_eq!(arp.spa, IFACE0_IP);
    assert_eq!(arp.tha, host_mac());
    assert_eq!(arp.tpa, HOST_IP);
    assert!(router.neighbors.is_empty());
}

#[test]
fn arp_request_for_other_address_is_ignored() {
    let mut router = new_router();
    let request = arp_frame(
        host_mac(),
        wire::BROADCAST_MAC,
        &ArpHeader {
            op: wire::ARP_OP_REQUEST,
            sha: host_mac(),
            spa: HOST_IP,
            tha: [0; 6],
            tpa: Ipv4Addr::new(192, 168, 0, 77),
        },
    );
    router.handle_frame(&request, 0).unwrap();
    assert!(router.link.sent.is_empty());
}

#[test]
fn bad_ipv4_checksum_is_dropped() {
    let mut router = forwarding_router();
    router.neighbors.insert(GATEWAY_IP, mac("00:11:22:33:44:55"));
    let mut frame = udp_frame(Ipv4Addr::new(10, 0, 0, 7), 10, b"hello");
    frame[wire::ipv4::OFFSET + 10] ^= 0xff;
    router.handle_frame(&frame, 0).unwrap();
    assert!(router.link.sent.is_empty());
}

#[test]
fn unknown_ethertype_is_dropped() {
    let mut router = new_router();
    let mut frame = vec![0u8; 60];
    wire::eth::set_ethertype(&mut frame, 0x86dd); // IPv6
    router.handle_frame(&frame, 0).unwrap();
    assert!(router.link.sent.is_empty());
    router.handle_frame(&[0u8; 4], 0).unwrap(); // runt
    assert!(router.link.sent.is_empty());
}

// The three response kinds carry the documented type codes and quotation
// sizes.
#[test]
fn icmp_kind_constants() {
    assert_eq!(IcmpKind::EchoReply.message_type(), 0);
    assert_eq!(IcmpKind::TimeExceeded.message_type(), 11);
    assert_eq!(IcmpKind::DestUnreachable.message_type(), 3);
    assert_eq!(IcmpKind::EchoReply.quote_len(), 0);
    assert_eq!(IcmpKind::TimeExceeded.quote_len(), 28);
    assert_eq!(IcmpKind::DestUnreachable.quote_len(), 28);
}

// An unsolicited ARP reply still populates the cache; the forwarding path
// then uses it directly.
#[test]
fn unsolicited_arp_reply_populates_cache() {
    let mut router = forwarding_router();
    let gateway_mac = mac("aa:bb:cc:dd:ee:ff");
    let reply = arp_frame(
        gateway_mac,
        iface1_mac(),
        &ArpHeader {
            op: wire::ARP_OP_REPLY,
            sha: gateway_mac,
            spa: GATEWAY_IP,
            tha: iface1_mac(),
            tpa: IFACE1_IP,
        },
    );
    router.handle_frame(&reply, 1).unwrap();
    assert_eq!(router.neighbors.lookup(GATEWAY_IP), Some(gateway_mac));
    assert!(router.link.sent.is_empty());

    router
        .handle_frame(&udp_frame(Ipv4Addr::new(10, 0, 0, 7), 10, b"hi"), 0)
        .unwrap();
    assert_eq!(router.link.sent.len(), 1);
    assert_eq!(wire::eth::dst(&router.link.sent[0].1), gateway_mac);
    assert_eq!(
        router.rib.lookup(Ipv4Addr::new(10, 0, 0, 7)),
        Some(NextHop {
            ip_addr: GATEWAY_IP,
            if_index: 1,
        })
    );
}
