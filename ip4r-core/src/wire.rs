//! # Wire-Format Views
//!
//! ## Purpose
//!
//! This module provides byte-exact access to the Ethernet, ARP, IPv4 and ICMP
//! headers inside the router's single working frame buffer. The forwarding
//! path rewrites headers in place (TTL surgery, MAC swaps, ICMP synthesis), so
//! everything here operates on plain byte slices at fixed offsets rather than
//! on deserialized copies.
//!
//! ## How it works
//!
//! Accessors read and write individual fields at their on-wire offsets; all
//! multi-byte fields are big-endian. The IPv4 and ICMP accessors assume the
//! 20-byte option-less header layout the router generates and accepts
//! (version 4, IHL 5); frames that do not match are dropped before any
//! accessor runs. ARP is handled as a value type ([`ArpHeader`]) because both
//! request and reply paths rewrite the full 28-byte header anyway.
//!
//! ## Main components
//!
//! - `eth`: Ethernet II header fields (destination, source, EtherType).
//! - `ipv4`: IPv4 header fields with in-place TTL/checksum update support.
//! - `icmp`: ICMP message fields at the fixed post-IPv4 offset.
//! - [`ArpHeader`]: parse/write of Ethernet/IPv4 ARP payloads.

use static_assertions::const_assert_eq;
use std::net::Ipv4Addr;

/// EtherType for IPv4 datagrams.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// EtherType for ARP payloads.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// ARP operation: request.
pub const ARP_OP_REQUEST: u16 = 1;
/// ARP operation: reply.
pub const ARP_OP_REPLY: u16 = 2;

/// Size of the working frame buffer, larger than any frame a 1500-byte MTU
/// interface can deliver.
pub const MAX_FRAME_LEN: usize = 1600;

/// Length of an Ethernet + ARP frame as emitted by the router.
pub const ARP_FRAME_LEN: usize = eth::LEN + ArpHeader::LEN;

/// The Ethernet broadcast address.
pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];

const_assert_eq!(ARP_FRAME_LEN, 42);
const_assert_eq!(icmp::OFFSET + icmp::LEN, 42);
const_assert_eq!(icmp::OFFSET + icmp::LEN + icmp::QUOTE_LEN, 70);

/// Ethernet II header fields.
pub mod eth {
    /// Ethernet header length.
    pub const LEN: usize = 14;

    pub fn dst(frame: &[u8]) -> [u8; 6] {
        frame[0..6].try_into().unwrap()
    }

    pub fn set_dst(frame: &mut [u8], mac: &[u8; 6]) {
        frame[0..6].copy_from_slice(mac);
    }

    pub fn src(frame: &[u8]) -> [u8; 6] {
        frame[6..12].try_into().unwrap()
    }

    pub fn set_src(frame: &mut [u8], mac: &[u8; 6]) {
        frame[6..12].copy_from_slice(mac);
    }

    pub fn ethertype(frame: &[u8]) -> u16 {
        u16::from_be_bytes([frame[12], frame[13]])
    }

    pub fn set_ethertype(frame: &mut [u8], ethertype: u16) {
        frame[12..14].copy_from_slice(&ethertype.to_be_bytes());
    }
}

/// IPv4 header fields, addressed relative to the start of the frame.
///
/// Offsets assume the option-less 20-byte header (IHL = 5); callers verify
/// [`version_ihl`] before using any other accessor.
pub mod ipv4 {
    use super::eth;
    use std::net::Ipv4Addr;

    /// IPv4 header length (no options).
    pub const LEN: usize = 20;
    /// Offset of the IPv4 header within the frame.
    pub const OFFSET: usize = eth::LEN;
    /// Protocol number of ICMP.
    pub const PROTO_ICMP: u8 = 1;

    pub fn version_ihl(frame: &[u8]) -> u8 {
        frame[OFFSET]
    }

    pub fn tot_len(frame: &[u8]) -> u16 {
        u16::from_be_bytes([frame[OFFSET + 2], frame[OFFSET + 3]])
    }

    pub fn set_tot_len(frame: &mut [u8], len: u16) {
        frame[OFFSET + 2..OFFSET + 4].copy_from_slice(&len.to_be_bytes());
    }

    pub fn ttl(frame: &[u8]) -> u8 {
        frame[OFFSET + 8]
    }

    pub fn set_ttl(frame: &mut [u8], ttl: u8) {
        frame[OFFSET + 8] = ttl;
    }

    pub fn protocol(frame: &[u8]) -> u8 {
        frame[OFFSET + 9]
    }

    pub fn checksum(frame: &[u8]) -> u16 {
        u16::from_be_bytes([frame[OFFSET + 10], frame[OFFSET + 11]])
    }

    pub fn set_checksum(frame: &mut [u8], check: u16) {
        frame[OFFSET + 10..OFFSET + 12].copy_from_slice(&check.to_be_bytes());
    }

    pub fn saddr(frame: &[u8]) -> Ipv4Addr {
        let b: [u8; 4] = frame[OFFSET + 12..OFFSET + 16].try_into().unwrap();
        Ipv4Addr::from(b)
    }

    pub fn set_saddr(frame: &mut [u8], addr: Ipv4Addr) {
        frame[OFFSET + 12..OFFSET + 16].copy_from_slice(&addr.octets());
    }

    pub fn daddr(frame: &[u8]) -> Ipv4Addr {
        let b: [u8; 4] = frame[OFFSET + 16..OFFSET + 20].try_into().unwrap();
        Ipv4Addr::from(b)
    }

    pub fn set_daddr(frame: &mut [u8], addr: Ipv4Addr) {
        frame[OFFSET + 16..OFFSET + 20].copy_from_slice(&addr.octets());
    }

    /// Copies the 20 header bytes out of the frame, for checksum validation
    /// without mutating the buffer.
    pub fn header(frame: &[u8]) -> [u8; LEN] {
        frame[OFFSET..OFFSET + LEN].try_into().unwrap()
    }
}

/// ICMP message fields at the fixed offset behind the option-less IPv4
/// header.
pub mod icmp {
    use super::{eth, ipv4};

    /// ICMP header length: type, code, checksum plus the 4-byte
    /// rest-of-header word (echo id/seq).
    pub const LEN: usize = 8;
    /// Offset of the ICMP header within the frame.
    pub const OFFSET: usize = eth::LEN + ipv4::LEN;
    /// Length of the quotation appended to error messages: the offending
    /// datagram's IPv4 header plus its first 8 bytes.
    pub const QUOTE_LEN: usize = ipv4::LEN + 8;
    /// ICMP message type of an Echo Request.
    pub const ECHO_REQUEST: u8 = 8;

    pub fn msg_type(frame: &[u8]) -> u8 {
        frame[OFFSET]
    }

    pub fn set_msg_type(frame: &mut [u8], t: u8) {
        frame[OFFSET] = t;
    }

    pub fn set_code(frame: &mut [u8], code: u8) {
        frame[OFFSET + 1] = code;
    }

    pub fn checksum(frame: &[u8]) -> u16 {
        u16::from_be_bytes([frame[OFFSET + 2], frame[OFFSET + 3]])
    }

    pub fn set_checksum(frame: &mut [u8], check: u16) {
        frame[OFFSET + 2..OFFSET + 4].copy_from_slice(&check.to_be_bytes());
    }

    /// Copies the 8 header bytes out of the frame.
    pub fn header(frame: &[u8]) -> [u8; LEN] {
        frame[OFFSET..OFFSET + LEN].try_into().unwrap()
    }
}

/// An Ethernet/IPv4 ARP header as a value type.
///
/// The constant hardware/protocol fields (HTYPE 1, PTYPE 0x0800, HLEN 6,
/// PLEN 4) are validated on parse and regenerated on write; only the
/// per-message fields are carried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpHeader {
    /// ARP operation, [`ARP_OP_REQUEST`] or [`ARP_OP_REPLY`].
    pub op: u16,
    /// Sender hardware address.
    pub sha: [u8; 6],
    /// Sender protocol address.
    pub spa: Ipv4Addr,
    /// Target hardware address.
    pub tha: [u8; 6],
    /// Target protocol address.
    pub tpa: Ipv4Addr,
}

impl ArpHeader {
    /// ARP header length for the Ethernet/IPv4 combination.
    pub const LEN: usize = 28;

    const HTYPE_ETHERNET: u16 = 1;
    const HLEN_ETHERNET: u8 = 6;
    const PLEN_IPV4: u8 = 4;

    /// Parses an ARP header from `body` (the frame payload after the
    /// Ethernet header).
    ///
    /// Returns `None` if the payload is short or not an Ethernet/IPv4 ARP
    /// message.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < Self::LEN {
            return None;
        }
        let htype = u16::from_be_bytes([body[0], body[1]]);
        let ptype = u16::from_be_bytes([body[2], body[3]]);
        if htype != Self::HTYPE_ETHERNET
            || ptype != ETHERTYPE_IPV4
            || body[4] != Self::HLEN_ETHERNET
            || body[5] != Self::PLEN_IPV4
        {
            return None;
        }
        let spa: [u8; 4] = body[14..18].try_into().unwrap();
        let tpa: [u8; 4] = body[24..28].try_into().unwrap();
        Some(ArpHeader {
            op: u16::from_be_bytes([body[6], body[7]]),
            sha: body[8..14].try_into().unwrap(),
            spa: Ipv4Addr::from(spa),
            tha: body[18..24].try_into().unwrap(),
            tpa: Ipv4Addr::from(tpa),
        })
    }

    /// Writes the full 28-byte header into `body`.
    pub fn write(&self, body: &mut [u8]) {
        body[0..2].copy_from_slice(&Self::HTYPE_ETHERNET.to_be_bytes());
        body[2..4].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        body[4] = Self::HLEN_ETHERNET;
        body[5] = Self::PLEN_IPV4;
        body[6..8].copy_from_slice(&self.op.to_be_bytes());
        body[8..14].copy_from_slice(&self.sha);
        body[14..18].copy_from_slice(&self.spa.octets());
        body[18..24].copy_from_slice(&self.tha);
        body[24..28].copy_from_slice(&self.tpa.octets());
    }
}
