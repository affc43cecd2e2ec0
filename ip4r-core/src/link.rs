//! # Link-Layer Contract
//!
//! ## Purpose
//!
//! The dataplane core never touches sockets directly; all frame I/O and
//! interface address queries go through this trait. The production
//! implementation wraps one packet socket per interface, while tests drive
//! the core with a scripted mock.
//!
//! ## How it works
//!
//! Interfaces are identified by small dense indexes, `0..n` in the order the
//! link layer was configured with them. The addresses of an interface are
//! fixed for the lifetime of the link, so `ipv4` and `mac` are plain
//! lookups. `recv_any` is the router's only blocking point.

use std::io;
use std::net::Ipv4Addr;

/// The layer-2 collaborator the router core consumes.
///
/// `if_index` arguments must be below the number of configured interfaces;
/// the router only uses indexes it previously received from `recv_any` or
/// from a routing table validated against the interface count.
pub trait LinkLayer {
    /// Blocks until a frame arrives on any interface, copies it into `buf`
    /// and returns its length and ingress interface index.
    fn recv_any(&mut self, buf: &mut [u8]) -> io::Result<(usize, u32)>;

    /// Transmits `frame` on the given interface, returning the number of
    /// bytes written.
    fn send(&mut self, if_index: u32, frame: &[u8]) -> io::Result<usize>;

    /// The IPv4 address assigned to an interface.
    fn ipv4(&self, if_index: u32) -> Ipv4Addr;

    /// The MAC address of an interface.
    fn mac(&self, if_index: u32) -> [u8; 6];
}
