//
// main.rs - Router Daemon
//
// Purpose:
//   Command-line entry point of the router: loads the static routing table,
//   brings up one packet socket per named interface and runs the dataplane
//   loop until the link layer fails.
//
// How it works:
//   - Requires CAP_NET_RAW; without it the AF_PACKET sockets cannot be
//     opened, so the daemon fails fast with a clear message.
//   - The routing table file is the line-oriented
//     `<prefix> <next_hop> <mask> <interface>` format; interface numbers in
//     it refer to positions in the interface list given on the command line
//     and are validated against it before any socket is opened.
//   - Logging goes through env_logger; RUST_LOG=debug traces every
//     forwarding decision.
//

use anyhow::Context as _;
use clap::Parser as _;
use ip4r_core::{Rib, Router};
use ip4r_link::PacketLink;
use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(name = "ip4rd", about = "Small software IPv4 router over raw packet sockets")]
struct Cli {
    /// Routing table file, one `prefix next_hop mask interface` entry per
    /// line.
    table: PathBuf,

    /// Interfaces to attach; the position in this list is the interface
    /// number the routing table refers to.
    #[arg(required = true)]
    interfaces: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let effect_caps = caps::read(None, caps::CapSet::Effective)
        .map_err(|e| anyhow::anyhow!("capability check failed: {e}"))?;
    anyhow::ensure!(
        effect_caps.contains(&caps::Capability::CAP_NET_RAW),
        "ip4rd needs CAP_NET_RAW to open packet sockets (try running as root)"
    );

    let rib = Rib::from_file(&cli.table)
        .with_context(|| format!("loading routing table {}", cli.table.display()))?;
    if let Some(max) = rib.max_interface() {
        anyhow::ensure!(
            (max as usize) < cli.interfaces.len(),
            "routing table refers to interface {max} but only {} interfaces were given",
            cli.interfaces.len()
        );
    }

    let link = PacketLink::open(&cli.interfaces).context("bringing up packet sockets")?;
    log::info!("forwarding across {} interfaces", link.len());

    let mut router = Router::new(link, rib);
    router.run().context("router event loop failed")?;
    Ok(())
}
