//! # ip4r-link: AF_PACKET Link Layer
//!
//! ## Purpose
//!
//! This crate provides the production [`LinkLayer`](ip4r_core::LinkLayer)
//! implementation for the router core: one raw packet socket per attached
//! network interface, delivering and accepting complete Ethernet frames.
//!
//! ## How it works
//!
//! Each interface is opened as an `AF_PACKET`/`SOCK_RAW` socket bound to the
//! device, so reads and writes carry whole layer-2 frames. The interface's
//! IPv4 and MAC addresses are snapshotted once at bring-up via ioctl; the
//! multi-interface receive `poll(2)`s across all sockets and reads from the
//! first one that becomes readable.
//!
//! ## Main components
//!
//! - [`PacketLink`]: the socket set implementing `LinkLayer`.

pub mod socket;

pub use socket::PacketLink;
