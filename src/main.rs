//! Darkseed daemon — DNS seeder for Bitcoin dark networks.
//!
//! Serves randomly sampled reachable-node addresses over DNS for five
//! network families. Tor, I2P and CJDNS addresses are carried inside
//! ordinary AAAA records using a reserved IPv6 prefix, so unmodified
//! recursive resolvers pass them through.

use clap::Parser;
use darkseed::dns::{DnsServer, SeedHandler};
use darkseed::nodes::NodeManager;
use darkseed::nodes::manager::DEFAULT_REFRESH_SECS;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Darkseed version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "darkseed", version, about = "Bitcoin DNS seeder for dark networks")]
struct Args {
    /// IP address the DNS server binds to
    #[arg(short, long, default_value = "127.0.0.1")]
    address: IpAddr,

    /// TCP and UDP port the DNS server binds to
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Domain name of the DNS zone (e.g. dnsseed.acme.com.)
    #[arg(short, long)]
    zone: String,

    /// Directory containing data created by the crawler
    #[arg(short, long, default_value = "/home/p2p-crawler")]
    crawler_dir: PathBuf,

    /// TTL for DNS records (in seconds)
    #[arg(short, long, default_value = "60")]
    ttl: u32,

    /// Node pool refresh interval (in seconds)
    #[arg(short, long, default_value_t = DEFAULT_REFRESH_SECS)]
    refresh: u64,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("darkseed=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let mut zone = args.zone.to_ascii_lowercase();
    if !zone.ends_with('.') {
        zone.push('.');
        warn!("Appended missing final dot to DNS zone: {}", zone);
    }

    info!("════════════════════════════════════════════════════════════");
    info!("  Darkseed v{} — Bitcoin darknet DNS seeder", VERSION);
    info!("════════════════════════════════════════════════════════════");
    info!("Zone: {} | Listen: {}:{}", zone, args.address, args.port);
    info!(
        "Crawler data: {} | TTL: {}s | Refresh: {}s",
        args.crawler_dir.display(),
        args.ttl,
        args.refresh
    );

    let manager = NodeManager::new(args.crawler_dir, Duration::from_secs(args.refresh));
    let mut manager_task = tokio::spawn(manager.clone().run());

    let handler = SeedHandler::new(&zone, args.ttl, manager.clone());
    let listen = SocketAddr::new(args.address, args.port);
    let server = match DnsServer::bind(listen, handler).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind DNS server on {}: {}", listen, e);
            return;
        }
    };

    info!("Darkseed running. Waiting for DNS queries...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            manager.shutdown();
        }
        result = server.run() => {
            if let Err(e) = result {
                error!("DNS server failed: {}", e);
            }
            manager.shutdown();
        }
        result = &mut manager_task => {
            // The refresh loop only exits on shutdown or a corrupt
            // snapshot; reaching this arm without a shutdown is fatal.
            match result {
                Ok(()) => error!("Node manager stopped unexpectedly"),
                Err(e) => error!("Node manager crashed: {}", e),
            }
            std::process::exit(1);
        }
    }

    // Give the refresh loop a moment to observe the shutdown signal.
    let _ = tokio::time::timeout(Duration::from_secs(1), manager_task).await;
}
