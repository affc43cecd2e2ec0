//! # IPv4 Forwarding Path
//!
//! ## Purpose
//!
//! Validates incoming IPv4 datagrams and moves them toward their next hop:
//! header checksum check, local-delivery detection, longest-prefix-match
//! lookup, TTL handling, and MAC resolution or deferral.
//!
//! ## How it works
//!
//! The datagram stays in the router's working buffer throughout. A checksum
//! mismatch drops it silently. A datagram addressed to the ingress
//! interface is answered with an Echo Reply when it is an ICMP Echo Request
//! and dropped otherwise. Anything else is routed: no route yields a
//! Destination Unreachable, an expiring TTL a Time Exceeded, and a viable
//! route gets the TTL decremented with an incremental checksum patch. If
//! the next hop's MAC is cached the frame leaves immediately; otherwise a
//! snapshot is parked on the pending queue and an ARP request goes out,
//! unless one is already in flight for that next hop.

use crate::checksum;
use crate::icmp::IcmpKind;
use crate::link::LinkLayer;
use crate::pending::PendingPacket;
use crate::router::Router;
use crate::wire;
use std::io;

impl<L: LinkLayer> Router<L> {
    pub(crate) fn handle_ipv4(&mut self, len: usize, ingress: u32) -> io::Result<()> {
        if len < wire::eth::LEN + wire::ipv4::LEN {
            log::debug!("dropping short IPv4 frame ({len} bytes)");
            return Ok(());
        }
        if wire::ipv4::version_ihl(&self.buf) != 0x45 {
            log::debug!("dropping IPv4 datagram with options or bad version");
            return Ok(());
        }

        let stored = wire::ipv4::checksum(&self.buf);
        let mut header = wire::ipv4::header(&self.buf);
        header[10] = 0;
        header[11] = 0;
        if checksum::internet(&header) != stored {
            log::debug!("dropping IPv4 datagram with bad header checksum");
            return Ok(());
        }

        if wire::ipv4::daddr(&self.buf) == self.link.ipv4(ingress) {
            return self.deliver_local(len, ingress);
        }

        let Some(hop) = self.rib.lookup(wire::ipv4::daddr(&self.buf)) else {
            return self.emit_icmp(len, ingress, IcmpKind::DestUnreachable);
        };

        let ttl = wire::ipv4::ttl(&self.buf);
        if ttl <= 1 {
            return self.emit_icmp(len, ingress, IcmpKind::TimeExceeded);
        }
        let patched = checksum::ttl_decrement(wire::ipv4::checksum(&self.buf), ttl);
        wire::ipv4::set_checksum(&mut self.buf, patched);
        wire::ipv4::set_ttl(&mut self.buf, ttl - 1);

        match self.neighbors.lookup(hop.ip_addr) {
            Some(mac) => {
                wire::eth::set_dst(&mut self.buf, &mac);
                let src = self.link.mac(hop.if_index);
                wire::eth::set_src(&mut self.buf, &src);
                self.link.send(hop.if_index, &self.buf[..len])?;
            }
            None => {
                self.pending.enqueue(PendingPacket {
                    frame: self.buf[..len].to_vec(),
                    if_index: hop.if_index,
                    next_hop: hop.ip_addr,
                });
                // At most one request in flight per next hop; the set entry
                // clears when the reply arrives.
                if self.requested.insert(hop.ip_addr) {
                    self.emit_arp_request(hop.ip_addr, hop.if_index)?;
                }
            }
        }
        Ok(())
    }

    /// The datagram is addressed to the ingress interface itself. Only ICMP
    /// Echo Requests get an answer.
    fn deliver_local(&mut self, len: usize, ingress: u32) -> io::Result<()> {
        if wire::ipv4::protocol(&self.buf) == wire::ipv4::PROTO_ICMP
            && len >= wire::icmp::OFFSET + wire::icmp::LEN
            && wire::icmp::msg_type(&self.buf) == wire::icmp::ECHO_REQUEST
        {
            self.emit_icmp(len, ingress, IcmpKind::EchoReply)
        } else {
            log::debug!("dropping local delivery that is not an echo request");
            Ok(())
        }
    }
}
