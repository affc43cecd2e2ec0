//! # IPv4 Routing Table
//!
//! ## Purpose
//!
//! This module holds the router's static routing table and answers
//! longest-prefix-match lookups: destination IPv4 address in, next-hop
//! address and egress interface out.
//!
//! ## How it works
//!
//! Routes are stored in a bitwise binary trie. Inserting a route walks one
//! edge per set mask bit, choosing left or right by the current low-order bit
//! of the masked prefix; the final node is marked valid and carries the
//! forwarding data. Lookup walks the destination address the same way and
//! keeps the deepest valid node it passes, which is exactly the
//! longest-prefix match. The traversal key packs the first on-wire octet
//! into the low byte of a `u32`, so shifting right consumes the address in
//! octet order, low bits of each octet first. Insert and lookup share this
//! bit order; routing-table files written for it keep producing identical
//! forwarding decisions.
//!
//! ## Main components
//!
//! - `Route`: one parsed routing-table entry.
//! - `Rib`: the trie, with `insert`, `lookup` and the table-file loader.
//! - `NextHop`: the result of a successful lookup.

use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

/// One routing-table entry: `prefix`/`mask` forwarded via `next_hop` out of
/// interface `if_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub if_index: u32,
}

/// The forwarding decision for a destination address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextHop {
    /// The next-hop IPv4 address the packet has to be handed to.
    pub ip_addr: Ipv4Addr,
    /// The interface the packet leaves through.
    pub if_index: u32,
}

#[derive(Default)]
struct Node {
    hop: Option<NextHop>,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// The routing information base: a binary trie over IPv4 prefixes.
pub struct Rib {
    root: Node,
    len: usize,
    max_if: Option<u32>,
}

fn key(ip: Ipv4Addr) -> u32 {
    u32::from_le_bytes(ip.octets())
}

impl Rib {
    /// Creates an empty routing table.
    pub fn new() -> Self {
        Rib {
            root: Node::default(),
            len: 0,
            max_if: None,
        }
    }

    /// Number of routes inserted (overwrites of an identical prefix/mask
    /// pair count once per insert).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The highest interface index any inserted route refers to.
    pub fn max_interface(&self) -> Option<u32> {
        self.max_if
    }

    /// Inserts a route.
    ///
    /// The prefix is masked before insertion, so `10.0.0.7/24` and
    /// `10.0.0.0/24` describe the same route. A zero mask is treated as "no
    /// route" and ignored. Inserting the same prefix/mask pair twice keeps
    /// the later forwarding data.
    pub fn insert(&mut self, route: &Route) {
        let mask = key(route.mask);
        if mask == 0 {
            log::debug!("ignoring zero-mask route toward {}", route.next_hop);
            return;
        }
        let mut bits = key(route.prefix) & mask;
        let mut depth = mask.count_ones();
        let mut node = &mut self.root;
        while depth > 0 {
            let child = if bits & 1 == 1 {
                &mut node.right
            } else {
                &mut node.left
            };
            node = child.get_or_insert_with(Box::default);
            bits >>= 1;
            depth -= 1;
        }
        node.hop = Some(NextHop {
            ip_addr: route.next_hop,
            if_index: route.if_index,
        });
        self.len += 1;
        self.max_if = Some(self.max_if.map_or(route.if_index, |m| m.max(route.if_index)));
    }

    /// Longest-prefix-match lookup.
    ///
    /// Walks the trie along the destination's bits and returns the
    /// forwarding data of the deepest valid node on the path, or `None` when
    /// no route matches.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<NextHop> {
        let mut bits = key(ip);
        let mut best = None;
        let mut node = Some(&self.root);
        while let Some(n) = node {
            if n.hop.is_some() {
                best = n.hop;
            }
            node = if bits & 1 == 1 {
                n.right.as_deref()
            } else {
                n.left.as_deref()
            };
            bits >>= 1;
        }
        best
    }

    /// Loads a routing table from the line-oriented text format:
    /// `<prefix> <next_hop> <mask> <interface>`, dotted-quad addresses, one
    /// route per line. Blank lines are ignored; malformed lines are skipped
    /// with a diagnostic.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut rib = Rib::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_route(line) {
                Some(route) => rib.insert(&route),
                None => log::warn!(
                    "{}:{}: skipping malformed route entry",
                    path.display(),
                    lineno + 1
                ),
            }
        }
        log::info!("loaded {} routes from {}", rib.len(), path.display());
        Ok(rib)
    }
}

impl Default for Rib {
    fn default() -> Self {
        Rib::new()
    }
}

fn parse_route(line: &str) -> Option<Route> {
    let mut fields = line.split_whitespace();
    let prefix = fields.next()?.parse().ok()?;
    let next_hop = fields.next()?.parse().ok()?;
    let mask = fields.next()?.parse().ok()?;
    let if_index = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Route {
        prefix,
        mask,
        next_hop,
        if_index,
    })
}
