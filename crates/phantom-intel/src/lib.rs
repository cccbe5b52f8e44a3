//! phantom-intel: Device intelligence for the Phantom scanner.
//!
//! Turns already-resolved host facts (manufacturer, open ports, optional
//! HTTP headers) into device type labels, a risk score and level, and a
//! list of matching signatures, and compares a finished scan against the
//! previous snapshot. Everything here is synchronous and free of network
//! access; the rule tables are passed in explicitly.

pub mod classify;
pub mod compare;
pub mod error;
pub mod risk;
pub mod rules;
pub mod signatures;

pub use classify::{Classifier, HttpHeaders};
pub use compare::{diff_scans, ChangeReport, DiffSummary, Escalation, ScanChanges};
pub use error::IntelError;
pub use risk::RiskAssessor;
pub use rules::{ClassifierRules, RiskRules, SubstringRule};
pub use signatures::{match_signatures, SignatureSet};

use phantom_core::{DeviceRecord, Signature};

/// Bundles the classifier, risk assessor and signature set.
///
/// Read-only once built, so a single instance can be shared across
/// scan workers behind an `Arc`.
pub struct DeviceIntel {
    classifier: Classifier,
    assessor: RiskAssessor,
    signatures: SignatureSet,
}

impl DeviceIntel {
    /// Create an engine with the built-in rule tables and no signatures.
    pub fn new() -> Self {
        Self {
            classifier: Classifier::default(),
            assessor: RiskAssessor::default(),
            signatures: SignatureSet::default(),
        }
    }

    pub fn with_signatures(mut self, signatures: SignatureSet) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// Whether the device's ports warrant an HTTP header probe.
    pub fn wants_http_probe(&self, device: &DeviceRecord) -> bool {
        self.classifier.wants_http_probe(&device.open_ports)
    }

    /// Classify and score a device in place: classifier first, then risk.
    pub fn enrich(&self, device: &mut DeviceRecord, headers: Option<&HttpHeaders>) {
        device.device_types =
            self.classifier
                .classify(&device.manufacturer, &device.open_ports, headers);
        self.assessor.assess(device);
    }

    /// Signatures matching the device, in declaration order.
    pub fn match_signatures<'a>(&'a self, device: &DeviceRecord) -> Vec<&'a Signature> {
        self.signatures.matches(device)
    }
}

impl Default for DeviceIntel {
    fn default() -> Self {
        Self::new()
    }
}
