//! phantom-core: Shared types and error handling for the Phantom scanner.
//!
//! This crate provides the foundational types used across all Phantom components:
//! - `DeviceRecord`, one enriched entry per discovered host
//! - `Signature`, a declarative detection rule
//! - `ScanSnapshot`, the persisted unit of scan history
//! - Port and MAC normalization applied once at the pipeline boundary

pub mod error;
pub mod types;

pub use error::PhantomError;
pub use types::{
    normalize_mac, normalize_ports, oui_prefix, DeviceRecord, Port, RawPort, RiskLevel,
    ScanSnapshot, Signature, SignatureConditions, UNKNOWN_DEVICE_TYPE, UNKNOWN_MANUFACTURER,
};
