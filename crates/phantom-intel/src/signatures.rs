//! Signature loading and matching.
//!
//! Signatures live in a YAML document with a top-level `signatures`
//! sequence:
//!
//! ```yaml
//! signatures:
//!   - name: Hikvision RTSP exposure
//!     description: Camera stream reachable without authentication
//!     conditions:
//!       manufacturer: [Hikvision]
//!       ports: [554]
//!     cve_info: CVE-2017-7921
//! ```
//!
//! A signature matches when every non-empty clause is satisfied. An empty
//! clause is a wildcard, so a signature with no clauses matches everything;
//! the loader warns about those but keeps them.

use std::path::Path;

use phantom_core::{DeviceRecord, Signature};
use serde::Deserialize;

use crate::error::{IntelError, Result};

#[derive(Debug, Default, Deserialize)]
struct SignatureDocument {
    #[serde(default)]
    signatures: Vec<Signature>,
}

/// An ordered, read-only list of signatures.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    pub fn new(signatures: Vec<Signature>) -> Self {
        for warning in validate_signatures(&signatures) {
            tracing::warn!("{warning}");
        }
        Self { signatures }
    }

    /// Load signatures from a YAML file, falling back to an empty set on
    /// any failure.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match parse_signature_file(path) {
            Ok(signatures) => {
                tracing::info!(
                    path = %path.display(),
                    count = signatures.len(),
                    "Signatures loaded"
                );
                Self::new(signatures)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load signatures");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Signatures matching `device`, in declaration order.
    pub fn matches<'a>(&'a self, device: &DeviceRecord) -> Vec<&'a Signature> {
        match_signatures(device, &self.signatures)
    }
}

/// Read and parse a signature document.
pub fn parse_signature_file(path: &Path) -> Result<Vec<Signature>> {
    if !path.exists() {
        return Err(IntelError::SignatureFileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_signatures(&content)
}

/// Parse a signature document from YAML text. An empty document yields no signatures.
pub fn parse_signatures(yaml: &str) -> Result<Vec<Signature>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: SignatureDocument = serde_yaml::from_str(yaml)?;
    Ok(doc.signatures)
}

/// Warnings for signatures that are probably authoring mistakes.
pub fn validate_signatures(signatures: &[Signature]) -> Vec<String> {
    signatures
        .iter()
        .filter(|sig| sig.is_unconditional())
        .map(|sig| {
            format!(
                "Signature '{}' has no manufacturer or port conditions and will match every device",
                sig.name
            )
        })
        .collect()
}

/// Whether a single signature matches a device.
pub fn signature_matches(signature: &Signature, device: &DeviceRecord) -> bool {
    let conditions = &signature.conditions;

    if !conditions.manufacturer.is_empty()
        && !conditions.manufacturer.contains(device.manufacturer.trim())
    {
        return false;
    }

    if !conditions.ports.is_empty()
        && !device.open_ports.iter().any(|p| conditions.ports.contains(p))
    {
        return false;
    }

    true
}

/// Evaluate every signature against a device, preserving declaration order.
pub fn match_signatures<'a>(device: &DeviceRecord, signatures: &'a [Signature]) -> Vec<&'a Signature> {
    signatures
        .iter()
        .filter(|sig| signature_matches(sig, device))
        .collect()
}
