//! Crawler snapshot discovery and parsing.
//!
//! The crawler periodically drops bz2-compressed CSV files named
//! `<timestamp>_reachable_nodes.csv.bz2` into a directory, where the
//! timestamp is `YYYY-MM-DDTHH-MM-SSZ`. Loading picks the newest file,
//! filters rows down to seed candidates and reports per-reason drop counts.

use crate::addr::Address;
use crate::nodes::{I2P_PORT, MAINNET_PORT, Node, SEED_SERVICES};
use bzip2::read::BzDecoder;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Filename suffix of crawler snapshots.
pub const SNAPSHOT_SUFFIX: &str = "_reachable_nodes.csv.bz2";

/// Timestamp format of the filename prefix.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no crawler data found in {0}")]
    NoData(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to read snapshot: {0}")]
    Csv(#[from] csv::Error),
}

/// Row drop statistics for one snapshot load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub total: usize,
    pub bad_port: usize,
    pub bad_services: usize,
    pub incomplete_handshake: usize,
    pub good: usize,
}

/// One crawler CSV row. `handshake_successful` is kept as a string because
/// the crawler writes `True`/`False`.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    host: String,
    port: u32,
    network: String,
    services: u64,
    handshake_successful: String,
}

/// Load the newest snapshot in `dir`.
pub fn load_latest(dir: &Path) -> Result<(Vec<Node>, SnapshotStats), SnapshotError> {
    let path = latest_snapshot(dir)?;
    read_snapshot(&path)
}

/// Find the snapshot file with the greatest leading timestamp.
///
/// Files with an unparsable timestamp are skipped, not fatal.
pub fn latest_snapshot(dir: &Path) -> Result<PathBuf, SnapshotError> {
    debug!("Looking for reachable node data in {}", dir.display());
    let mut latest: Option<(NaiveDateTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if !name.ends_with(SNAPSHOT_SUFFIX) {
            continue;
        }
        let Some(prefix) = name.split('_').next() else {
            continue;
        };
        let timestamp = match NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT) {
            Ok(ts) => ts,
            Err(e) => {
                debug!("Skipping snapshot with unparsable timestamp {}: {}", name, e);
                continue;
            }
        };
        if latest.as_ref().is_none_or(|(best, _)| timestamp > *best) {
            latest = Some((timestamp, entry.path()));
        }
    }
    latest
        .map(|(_, path)| path)
        .ok_or_else(|| SnapshotError::NoData(dir.to_path_buf()))
}

/// Read one snapshot file and extract seed candidates.
///
/// Rows are dropped locally when they use a non-canonical port, failed the
/// protocol handshake, lack the seed service bits, or do not parse. A row
/// whose derived network type contradicts its `network` column means the
/// snapshot itself is corrupt and is treated as an assertion failure.
pub fn read_snapshot(path: &Path) -> Result<(Vec<Node>, SnapshotStats), SnapshotError> {
    let file = fs::File::open(path)?;
    let mut reader = csv::Reader::from_reader(BzDecoder::new(file));

    let mut nodes = Vec::new();
    let mut stats = SnapshotStats::default();
    for row in reader.deserialize::<SnapshotRow>() {
        stats.total += 1;
        let row = match row {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                debug!("Dropping unparsable snapshot row: {}", e);
                continue;
            }
        };
        let canonical_port = if row.network == "i2p" { I2P_PORT } else { MAINNET_PORT };
        if row.port != canonical_port as u32 {
            stats.bad_port += 1;
            continue;
        }
        if !row.handshake_successful.eq_ignore_ascii_case("true") {
            stats.incomplete_handshake += 1;
            continue;
        }
        if row.services & SEED_SERVICES != SEED_SERVICES {
            stats.bad_services += 1;
            continue;
        }
        let addr = match row.host.parse::<Address>() {
            Ok(addr) => addr,
            Err(e) => {
                debug!("Dropping snapshot row with bad host {}: {}", row.host, e);
                continue;
            }
        };
        // The crawler derives the network column from the same host string;
        // a mismatch means the snapshot is corrupt.
        assert_eq!(
            addr.network().to_string(),
            row.network,
            "network column mismatch in snapshot row for {}",
            row.host
        );
        stats.good += 1;
        nodes.push(Node::new(addr, row.port as u16, row.services));
    }

    info!(
        "Extracted {} viable nodes from {} (total={}, bad_port={}, bad_services={}, incomplete_handshake={})",
        stats.good,
        path.display(),
        stats.total,
        stats.bad_port,
        stats.bad_services,
        stats.incomplete_handshake,
    );
    Ok((nodes, stats))
}
