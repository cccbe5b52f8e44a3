//! Snapshot storage: trait + file-system implementation.
//!
//! Snapshots are stored as pretty-printed JSON files in a flat directory:
//! ```text
//! {root}/
//!   scan_1760601600000_192.168.1.0-24.json
//!   scan_1760605200000_192.168.1.0-24.json
//!   scan_1760605300000_10.0.0.0-24.json
//! ```
//!
//! The previous snapshot for a subnet is the most recently created file
//! whose name carries that subnet. Files written before sealing existed
//! (no `content_hash`, naive timestamps) still load, with a warning.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use phantom_core::ScanSnapshot;

/// Errors that can occur during snapshot storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Integrity check failed for snapshot {0}: stored hash does not match content")]
    IntegrityViolation(PathBuf),

    #[error("Snapshot has no content hash (not sealed)")]
    NotSealed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for snapshot persistence backends.
pub trait SnapshotStore {
    /// Store a sealed snapshot and return where it was written.
    fn save(&self, snapshot: &ScanSnapshot) -> Result<PathBuf, StoreError>;

    /// The most recent snapshot for `subnet`, verified. `None` if there is no history.
    fn latest_for_subnet(&self, subnet: &str) -> Result<Option<ScanSnapshot>, StoreError>;
}

/// File-system backed snapshot store.
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the file path for a snapshot from its timestamp and subnet.
    fn snapshot_path(&self, snapshot: &ScanSnapshot) -> PathBuf {
        self.root.join(format!(
            "scan_{}_{}.json",
            snapshot.timestamp.timestamp_millis(),
            subnet_key(&snapshot.subnet)
        ))
    }

    /// Snapshot files for a subnet, newest first.
    fn files_for_subnet(&self, subnet: &str) -> Result<Vec<PathBuf>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let suffix = format!("_{}.json", subnet_key(subnet));
        let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("scan_") || !name.ends_with(&suffix) {
                continue;
            }
            let name = name.to_string();
            files.push((creation_time(&path), name, path));
        }

        files.sort_by(|a, b| (&b.0, &b.1).cmp(&(&a.0, &a.1)));
        Ok(files.into_iter().map(|(_, _, path)| path).collect())
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn save(&self, snapshot: &ScanSnapshot) -> Result<PathBuf, StoreError> {
        if snapshot.content_hash.is_none() {
            return Err(StoreError::NotSealed);
        }

        let path = self.snapshot_path(snapshot);
        let json = snapshot.to_json_pretty().map_err(|e| match e {
            phantom_core::PhantomError::Serialization(inner) => StoreError::Serialization(inner),
            other => StoreError::Io(std::io::Error::other(other.to_string())),
        })?;
        fs::write(&path, json)?;

        tracing::info!(
            path = %path.display(),
            subnet = %snapshot.subnet,
            devices = snapshot.devices.len(),
            "Snapshot saved"
        );

        Ok(path)
    }

    fn latest_for_subnet(&self, subnet: &str) -> Result<Option<ScanSnapshot>, StoreError> {
        let Some(path) = self.files_for_subnet(subnet)?.into_iter().next() else {
            tracing::info!(subnet, "No previous scans found");
            return Ok(None);
        };

        let snapshot = read_snapshot(&path)?;
        tracing::debug!(path = %path.display(), "Loaded previous snapshot");
        Ok(Some(snapshot))
    }
}

/// File-name form of a subnet: `/` is not allowed in names.
pub fn subnet_key(subnet: &str) -> String {
    subnet.replace('/', "-")
}

fn read_snapshot(path: &Path) -> Result<ScanSnapshot, StoreError> {
    let bytes = fs::read(path)?;
    let snapshot: ScanSnapshot = serde_json::from_slice(&bytes)?;

    if snapshot.content_hash.is_none() {
        tracing::warn!(path = %path.display(), "Loaded unsealed legacy snapshot, integrity not verifiable");
        return Ok(snapshot);
    }

    if !crate::verify_integrity(&snapshot) {
        return Err(StoreError::IntegrityViolation(path.to_path_buf()));
    }

    Ok(snapshot)
}

fn creation_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
