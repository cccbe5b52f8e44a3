//! BLAKE3 content hashing for tamper evidence.
//!
//! Computes a deterministic hash of all snapshot fields (excluding the
//! content_hash itself) so that any edit to a stored scan is detectable.

use chrono::{DateTime, Utc};
use phantom_core::{DeviceRecord, ScanSnapshot};
use serde::Serialize;

/// Hashable representation of a snapshot (excludes content_hash).
#[derive(Serialize)]
struct HashableSnapshot<'a> {
    timestamp: &'a DateTime<Utc>,
    subnet: &'a str,
    devices: &'a [DeviceRecord],
}

/// Compute the BLAKE3 hash of a snapshot's content, hex-encoded.
pub fn compute_snapshot_hash(snapshot: &ScanSnapshot) -> Result<String, serde_json::Error> {
    let hashable = HashableSnapshot {
        timestamp: &snapshot.timestamp,
        subnet: &snapshot.subnet,
        devices: &snapshot.devices,
    };

    let json = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}
