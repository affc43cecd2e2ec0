//! # ICMP Responder
//!
//! ## Purpose
//!
//! Synthesizes the three ICMP messages the router originates (Echo Reply,
//! Time Exceeded, Destination Unreachable) in place, inside the working
//! buffer that still holds the datagram being answered.
//!
//! ## How it works
//!
//! The three message types share one emitter and differ only in their type
//! code and payload. An Echo Reply reuses the inbound ICMP payload where it
//! lies: the frame keeps its length and only the type, checksums and
//! addresses change. The two error types quote the offending datagram: its
//! IPv4 header plus the first 8 datagram bytes are copied behind the fresh
//! ICMP header before that header overwrites them. The ICMP checksum covers
//! the 8 header bytes, matching the wire format this router's peers expect.
//! A new IPv4 header is then written (TTL 64, addresses swapped toward the
//! original sender) and the Ethernet addresses are turned around. The
//! response always leaves through the interface the datagram came in on.

use crate::checksum;
use crate::link::LinkLayer;
use crate::router::Router;
use crate::wire;
use std::io;
use std::net::Ipv4Addr;

/// Default TTL for datagrams the router originates.
const REPLY_TTL: u8 = 64;

/// The ICMP messages the router can originate. The code field is always 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IcmpKind {
    /// Type 0, answering an Echo Request delivered to the router itself.
    EchoReply,
    /// Type 11, the forwarded datagram's TTL expired.
    TimeExceeded,
    /// Type 3, no route matched the destination.
    DestUnreachable,
}

impl IcmpKind {
    /// The on-wire ICMP type.
    pub fn message_type(self) -> u8 {
        match self {
            IcmpKind::EchoReply => 0,
            IcmpKind::TimeExceeded => 11,
            IcmpKind::DestUnreachable => 3,
        }
    }

    /// Bytes of the offending datagram quoted after the ICMP header.
    pub fn quote_len(self) -> usize {
        match self {
            IcmpKind::EchoReply => 0,
            IcmpKind::TimeExceeded | IcmpKind::DestUnreachable => wire::icmp::QUOTE_LEN,
        }
    }
}

impl<L: LinkLayer> Router<L> {
    /// Rewrites the working buffer into an ICMP response to the datagram it
    /// holds and transmits it on the ingress interface.
    ///
    /// `len` is the length of the inbound frame; for an Echo Reply it is
    /// also the length of the response.
    pub(crate) fn emit_icmp(&mut self, len: usize, ingress: u32, kind: IcmpKind) -> io::Result<()> {
        let orig_saddr = wire::ipv4::saddr(&self.buf);
        let local_ip = self.link.ipv4(ingress);

        let (out_len, tot_len) = match kind.quote_len() {
            0 => (len, wire::ipv4::tot_len(&self.buf)),
            quote => {
                // Quote the offending header and first payload bytes before
                // the new ICMP header overwrites the front of the datagram.
                self.buf.copy_within(
                    wire::ipv4::OFFSET..wire::ipv4::OFFSET + quote,
                    wire::icmp::OFFSET + wire::icmp::LEN,
                );
                let body = wire::ipv4::LEN + wire::icmp::LEN + quote;
                (wire::eth::LEN + body, body as u16)
            }
        };

        wire::icmp::set_msg_type(&mut self.buf, kind.message_type());
        wire::icmp::set_code(&mut self.buf, 0);
        wire::icmp::set_checksum(&mut self.buf, 0);
        let icmp_check = checksum::internet(&wire::icmp::header(&self.buf));
        wire::icmp::set_checksum(&mut self.buf, icmp_check);

        self.rewrite_ipv4_reply(local_ip, orig_saddr, tot_len);

        let sender = wire::eth::src(&self.buf);
        wire::eth::set_dst(&mut self.buf, &sender);
        let local_mac = self.link.mac(ingress);
        wire::eth::set_src(&mut self.buf, &local_mac);

        log::debug!(
            "sending ICMP type {} to {orig_saddr} on interface {ingress}",
            kind.message_type()
        );
        self.link.send(ingress, &self.buf[..out_len])?;
        Ok(())
    }

    /// Writes a fresh option-less IPv4 header for a router-originated ICMP
    /// datagram and fills in its checksum.
    fn rewrite_ipv4_reply(&mut self, saddr: Ipv4Addr, daddr: Ipv4Addr, tot_len: u16) {
        let ip = wire::ipv4::OFFSET;
        self.buf[ip] = 0x45; // version 4, IHL 5
        self.buf[ip + 1] = 0; // TOS
        wire::ipv4::set_tot_len(&mut self.buf, tot_len);
        self.buf[ip + 4..ip + 6].copy_from_slice(&1u16.to_be_bytes()); // id
        self.buf[ip + 6] = 0; // flags / fragment offset
        self.buf[ip + 7] = 0;
        wire::ipv4::set_ttl(&mut self.buf, REPLY_TTL);
        self.buf[ip + 9] = wire::ipv4::PROTO_ICMP;
        wire::ipv4::set_checksum(&mut self.buf, 0);
        wire::ipv4::set_saddr(&mut self.buf, saddr);
        wire::ipv4::set_daddr(&mut self.buf, daddr);
        let check = checksum::internet(&wire::ipv4::header(&self.buf));
        wire::ipv4::set_checksum(&mut self.buf, check);
    }
}
