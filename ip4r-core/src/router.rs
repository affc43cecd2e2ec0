//! # Router Dispatch Loop
//!
//! ## Purpose
//!
//! This module ties the dataplane together: one [`Router`] owns the routing
//! table, the neighbor cache, the pending queue and the working frame
//! buffer, and processes frames one at a time to completion.
//!
//! ## How it works
//!
//! `run` blocks on the link layer's multi-interface receive and hands every
//! frame to `dispatch`, which demultiplexes on the EtherType: IPv4 goes to
//! the forwarding path, ARP to the resolver, anything else is dropped. All
//! per-frame state lives in the single working buffer; by the time
//! `dispatch` returns the frame has been forwarded, answered, parked on the
//! pending queue, or dropped. Per-frame errors never propagate; the core
//! is an event sink and recovery is local. Link-layer I/O failures do
//! propagate and terminate the loop.
//!
//! ## Main components
//!
//! - [`Router`]: the dataplane state and its working buffer.
//! - `run()`: the blocking receive loop.
//! - `dispatch()` / `handle_frame()`: single-frame entry points.

use crate::link::LinkLayer;
use crate::neighbors::NeighborCache;
use crate::pending::PendingQueue;
use crate::rib::Rib;
use crate::wire;
use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;

/// The packet-processing core of the router.
///
/// All fields are accessible so embedders and tests can seed the caches or
/// inspect them between frames; during `dispatch` the router has exclusive
/// use of everything here.
pub struct Router<L: LinkLayer> {
    /// The layer-2 interface collaborator.
    pub link: L,
    /// The static routing table.
    pub rib: Rib,
    /// IPv4 → MAC mappings learned from ARP replies.
    pub neighbors: NeighborCache,
    /// Frames parked until their next hop resolves.
    pub pending: PendingQueue,
    /// Next hops with an ARP request in flight; suppresses duplicate
    /// requests while packets accumulate on the pending queue.
    pub requested: HashSet<Ipv4Addr>,
    /// The working frame buffer; owns the current frame for exactly one
    /// dispatch.
    pub(crate) buf: Vec<u8>,
}

impl<L: LinkLayer> Router<L> {
    pub fn new(link: L, rib: Rib) -> Self {
        Router {
            link,
            rib,
            neighbors: NeighborCache::new(),
            pending: PendingQueue::new(),
            requested: HashSet::new(),
            buf: vec![0u8; wire::MAX_FRAME_LEN],
        }
    }

    /// Receives and processes frames forever.
    ///
    /// Returns only when the link layer fails.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            let (len, ingress) = self.link.recv_any(&mut self.buf)?;
            self.dispatch(len, ingress)?;
        }
    }

    /// Processes one frame that an embedder already copied somewhere else.
    ///
    /// Copies `frame` into the working buffer and dispatches it as if it had
    /// arrived on `if_index`.
    pub fn handle_frame(&mut self, frame: &[u8], if_index: u32) -> io::Result<()> {
        if frame.len() > wire::MAX_FRAME_LEN {
            log::debug!("dropping oversized {}-byte frame", frame.len());
            return Ok(());
        }
        self.buf[..frame.len()].copy_from_slice(frame);
        self.dispatch(frame.len(), if_index)
    }

    /// Demultiplexes the frame in the working buffer by EtherType.
    pub fn dispatch(&mut self, len: usize, ingress: u32) -> io::Result<()> {
        if len < wire::eth::LEN {
            log::debug!("dropping runt {len}-byte frame on interface {ingress}");
            return Ok(());
        }
        match wire::eth::ethertype(&self.buf) {
            wire::ETHERTYPE_IPV4 => self.handle_ipv4(len, ingress),
            wire::ETHERTYPE_ARP => self.handle_arp(len, ingress),
            other => {
                log::debug!(
                    "dropping frame with unhandled ethertype {other:#06x} on interface {ingress}"
                );
                Ok(())
            }
        }
    }
}
