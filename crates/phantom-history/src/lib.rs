//! phantom-history: Scan snapshot persistence.
//!
//! Every scan run ends with a `ScanSnapshot` written to the history
//! directory. Snapshots are sealed with a BLAKE3 content hash before they
//! are stored and verified when read back, so the baseline used for change
//! detection cannot be silently edited.

pub mod hash;
pub mod store;

use phantom_core::ScanSnapshot;

pub use store::{FsSnapshotStore, SnapshotStore, StoreError};

/// Compute and attach the content hash. The snapshot is immutable from here on.
pub fn seal(mut snapshot: ScanSnapshot) -> Result<ScanSnapshot, StoreError> {
    let hash = hash::compute_snapshot_hash(&snapshot)?;
    snapshot.content_hash = Some(hash);
    Ok(snapshot)
}

/// Verify that the stored content_hash matches a freshly computed hash.
pub fn verify_integrity(snapshot: &ScanSnapshot) -> bool {
    match (&snapshot.content_hash, hash::compute_snapshot_hash(snapshot)) {
        (Some(stored), Ok(computed)) => stored == &computed,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phantom_core::DeviceRecord;

    #[test]
    fn sealed_snapshot_verifies() {
        let snapshot = seal(ScanSnapshot::new("10.0.0.0/24", vec![DeviceRecord::new("10.0.0.1")]))
            .unwrap();
        assert!(snapshot.content_hash.is_some());
        assert!(verify_integrity(&snapshot));
    }

    #[test]
    fn unsealed_snapshot_fails_verification() {
        let snapshot = ScanSnapshot::new("10.0.0.0/24", vec![]);
        assert!(!verify_integrity(&snapshot));
    }

    #[test]
    fn edit_after_seal_detected() {
        let mut snapshot =
            seal(ScanSnapshot::new("10.0.0.0/24", vec![DeviceRecord::new("10.0.0.1")])).unwrap();
        snapshot.devices[0].risk_score = 0;
        assert!(verify_integrity(&snapshot));

        snapshot.devices[0].risk_score = 42;
        assert!(!verify_integrity(&snapshot));
    }

    #[test]
    fn hash_is_deterministic() {
        let snapshot = ScanSnapshot::new("192.168.1.0/24", vec![DeviceRecord::new("192.168.1.7")]);
        let a = hash::compute_snapshot_hash(&snapshot).unwrap();
        let b = hash::compute_snapshot_hash(&snapshot).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
