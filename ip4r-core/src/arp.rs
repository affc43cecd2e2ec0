//! # ARP Resolver
//!
//! ## Purpose
//!
//! Answers ARP requests for the router's own interface addresses, learns
//! neighbor MACs from ARP replies, releases packets that were parked on the
//! pending queue once their next hop resolves, and emits ARP requests for
//! unresolved next hops.
//!
//! ## How it works
//!
//! Requests whose target protocol address is not the ingress interface's
//! IPv4 are dropped; for our own address the header is rewritten in place
//! into a reply and sent back out the ingress interface. Replies insert the
//! sender's mapping into the neighbor cache (first write wins), clear the
//! outstanding-request mark, and drain every pending packet waiting on that
//! address: each one gets its Ethernet header completed from the reply and
//! the egress interface, then leaves through the link. Answering a request
//! does not touch the cache; only observed replies do.

use crate::link::LinkLayer;
use crate::router::Router;
use crate::wire::{self, ArpHeader};
use std::io;
use std::net::Ipv4Addr;

impl<L: LinkLayer> Router<L> {
    pub(crate) fn handle_arp(&mut self, len: usize, ingress: u32) -> io::Result<()> {
        if len < wire::ARP_FRAME_LEN {
            log::debug!("dropping short ARP frame ({len} bytes)");
            return Ok(());
        }
        let Some(hdr) = ArpHeader::parse(&self.buf[wire::eth::LEN..len]) else {
            log::debug!("dropping malformed ARP frame");
            return Ok(());
        };

        match hdr.op {
            wire::ARP_OP_REQUEST => {
                if hdr.tpa != self.link.ipv4(ingress) {
                    log::debug!("ignoring ARP request for {} (not ours)", hdr.tpa);
                    return Ok(());
                }
                let local_mac = self.link.mac(ingress);
                let reply = ArpHeader {
                    op: wire::ARP_OP_REPLY,
                    sha: local_mac,
                    spa: hdr.tpa,
                    tha: hdr.sha,
                    tpa: hdr.spa,
                };
                reply.write(&mut self.buf[wire::eth::LEN..]);
                let requester = wire::eth::src(&self.buf);
                wire::eth::set_dst(&mut self.buf, &requester);
                wire::eth::set_src(&mut self.buf, &local_mac);
                log::debug!("answering ARP request for {} on interface {ingress}", hdr.tpa);
                self.link.send(ingress, &self.buf[..len])?;
            }
            wire::ARP_OP_REPLY => {
                self.requested.remove(&hdr.spa);
                self.neighbors.insert(hdr.spa, hdr.sha);
                self.release_pending(hdr.spa, hdr.sha)?;
            }
            op => log::debug!("dropping ARP frame with unhandled op {op}"),
        }
        Ok(())
    }

    /// Transmits every parked packet whose next hop just resolved to `mac`.
    fn release_pending(&mut self, next_hop: Ipv4Addr, mac: [u8; 6]) -> io::Result<()> {
        for mut pkt in self.pending.take_matching(next_hop) {
            wire::eth::set_dst(&mut pkt.frame, &mac);
            let src = self.link.mac(pkt.if_index);
            wire::eth::set_src(&mut pkt.frame, &src);
            wire::eth::set_ethertype(&mut pkt.frame, wire::ETHERTYPE_IPV4);
            log::debug!(
                "releasing parked packet toward {next_hop} on interface {}",
                pkt.if_index
            );
            self.link.send(pkt.if_index, &pkt.frame)?;
        }
        Ok(())
    }

    /// Broadcasts an ARP request for `next_hop` out of `egress`.
    ///
    /// Overwrites the working buffer; callers snapshot the current frame
    /// first if they still need it.
    pub(crate) fn emit_arp_request(&mut self, next_hop: Ipv4Addr, egress: u32) -> io::Result<()> {
        let local_mac = self.link.mac(egress);
        wire::eth::set_dst(&mut self.buf, &wire::BROADCAST_MAC);
        wire::eth::set_src(&mut self.buf, &local_mac);
        wire::eth::set_ethertype(&mut self.buf, wire::ETHERTYPE_ARP);
        let request = ArpHeader {
            op: wire::ARP_OP_REQUEST,
            sha: local_mac,
            spa: self.link.ipv4(egress),
            tha: [0; 6],
            tpa: next_hop,
        };
        request.write(&mut self.buf[wire::eth::LEN..]);
        log::debug!("requesting MAC of {next_hop} on interface {egress}");
        self.link.send(egress, &self.buf[..wire::ARP_FRAME_LEN])?;
        Ok(())
    }
}
