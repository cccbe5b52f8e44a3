//! Change detection between the current scan and the previous snapshot.
//!
//! Three change classes are reported, keyed by IP:
//! - new: present now, absent from the baseline
//! - vanished: present in the baseline, absent now
//! - escalated: present in both with a strictly higher score now
//!
//! Lower or equal scores are never reported, even when the level label
//! differs. Manufacturer, port and type drift on a known IP are not compared.

use std::collections::{HashMap, HashSet};

use phantom_core::{DeviceRecord, RiskLevel, ScanSnapshot};
use serde::Serialize;

/// A device whose risk score rose between two scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Escalation {
    pub ip: String,
    pub previous_score: u32,
    pub current_score: u32,
    pub previous_level: RiskLevel,
    pub current_level: RiskLevel,
}

/// The three change classes found against a baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanChanges {
    pub new_devices: Vec<DeviceRecord>,
    pub vanished_devices: Vec<DeviceRecord>,
    pub escalations: Vec<Escalation>,
    pub summary: DiffSummary,
}

impl ScanChanges {
    pub fn is_empty(&self) -> bool {
        self.new_devices.is_empty() && self.vanished_devices.is_empty() && self.escalations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub total_scanned: u32,
    pub new_count: u32,
    pub vanished_count: u32,
    pub escalated_count: u32,
}

/// Outcome of comparing a scan against history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeReport {
    /// No previous snapshot exists for the subnet; nothing was compared.
    NoBaseline,
    /// A baseline existed; the changes may still be empty.
    Compared(ScanChanges),
}

impl ChangeReport {
    pub fn changes(&self) -> Option<&ScanChanges> {
        match self {
            Self::NoBaseline => None,
            Self::Compared(changes) => Some(changes),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.changes().is_some_and(|c| !c.is_empty())
    }
}

/// Compare the current devices against an optional baseline snapshot.
///
/// Neither input is modified. New and escalated entries follow the order
/// of `current`; vanished entries follow the baseline's order.
pub fn diff_scans(current: &[DeviceRecord], previous: Option<&ScanSnapshot>) -> ChangeReport {
    let Some(previous) = previous else {
        tracing::info!("No previous scan to compare against");
        return ChangeReport::NoBaseline;
    };

    let baseline: HashMap<&str, &DeviceRecord> = previous
        .devices
        .iter()
        .map(|d| (d.ip.as_str(), d))
        .collect();

    let mut new_devices = Vec::new();
    let mut escalations = Vec::new();
    let mut seen_ips: HashSet<&str> = HashSet::new();

    for device in current {
        if !seen_ips.insert(device.ip.as_str()) {
            continue;
        }

        match baseline.get(device.ip.as_str()) {
            None => new_devices.push(device.clone()),
            Some(prev) if device.risk_score > prev.risk_score => {
                tracing::info!(
                    ip = %device.ip,
                    previous_score = prev.risk_score,
                    current_score = device.risk_score,
                    "Risk escalated"
                );
                escalations.push(Escalation {
                    ip: device.ip.clone(),
                    previous_score: prev.risk_score,
                    current_score: device.risk_score,
                    previous_level: prev.risk_level,
                    current_level: device.risk_level,
                });
            }
            Some(_) => {}
        }
    }

    let mut reported_vanished: HashSet<&str> = HashSet::new();
    let vanished_devices: Vec<DeviceRecord> = previous
        .devices
        .iter()
        .filter(|d| !seen_ips.contains(d.ip.as_str()))
        .filter(|d| reported_vanished.insert(d.ip.as_str()))
        .cloned()
        .collect();

    let summary = DiffSummary {
        total_scanned: seen_ips.len() as u32,
        new_count: new_devices.len() as u32,
        vanished_count: vanished_devices.len() as u32,
        escalated_count: escalations.len() as u32,
    };

    ChangeReport::Compared(ScanChanges {
        new_devices,
        vanished_devices,
        escalations,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(ip: &str, score: u32) -> DeviceRecord {
        let mut d = DeviceRecord::new(ip);
        d.risk_score = score;
        d.risk_level = RiskLevel::from_score(score);
        d
    }

    fn snapshot(devices: Vec<DeviceRecord>) -> ScanSnapshot {
        ScanSnapshot::new("10.0.0.0/24", devices)
    }

    #[test]
    fn test_no_baseline_is_distinct() {
        let report = diff_scans(&[scored("10.0.0.9", 3)], None);
        assert_eq!(report, ChangeReport::NoBaseline);
        assert!(report.changes().is_none());
        assert!(!report.has_changes());
    }

    #[test]
    fn test_empty_baseline_reports_all_new() {
        let report = diff_scans(&[scored("10.0.0.9", 0)], Some(&snapshot(vec![])));
        let changes = report.changes().unwrap();
        assert_eq!(changes.new_devices.len(), 1);
        assert_eq!(changes.new_devices[0].ip, "10.0.0.9");
        assert!(changes.vanished_devices.is_empty());
        assert!(changes.escalations.is_empty());
    }

    #[test]
    fn test_vanished_device() {
        let report = diff_scans(&[], Some(&snapshot(vec![scored("10.0.0.2", 4)])));
        let changes = report.changes().unwrap();
        assert_eq!(changes.vanished_devices.len(), 1);
        assert_eq!(changes.vanished_devices[0].ip, "10.0.0.2");
        assert!(changes.new_devices.is_empty());
        assert_eq!(changes.summary.vanished_count, 1);
    }

    #[test]
    fn test_escalation_reported() {
        let report = diff_scans(
            &[scored("10.0.0.5", 8)],
            Some(&snapshot(vec![scored("10.0.0.5", 3)])),
        );
        let changes = report.changes().unwrap();
        assert_eq!(
            changes.escalations,
            vec![Escalation {
                ip: "10.0.0.5".to_string(),
                previous_score: 3,
                current_score: 8,
                previous_level: RiskLevel::Low,
                current_level: RiskLevel::Medium,
            }]
        );
        assert!(report.has_changes());
    }

    #[test]
    fn test_equal_or_lower_score_not_escalation() {
        let prev = snapshot(vec![scored("10.0.0.5", 8), scored("10.0.0.6", 5)]);
        let mut relabeled = scored("10.0.0.6", 5);
        relabeled.risk_level = RiskLevel::High;

        let report = diff_scans(&[scored("10.0.0.5", 2), relabeled], Some(&prev));
        let changes = report.changes().unwrap();
        assert!(changes.is_empty());
        assert!(!report.has_changes());
    }

    #[test]
    fn test_snapshot_against_itself_is_empty() {
        let snap = snapshot(vec![scored("10.0.0.1", 12), scored("10.0.0.2", 0), scored("10.0.0.3", 6)]);
        let report = diff_scans(&snap.devices, Some(&snap));
        let changes = report.changes().unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.summary.total_scanned, 3);
    }

    #[test]
    fn test_mixed_changes() {
        let prev = snapshot(vec![scored("10.0.0.1", 2), scored("10.0.0.2", 2), scored("10.0.0.3", 9)]);
        let current = vec![scored("10.0.0.1", 11), scored("10.0.0.3", 9), scored("10.0.0.4", 1)];

        let report = diff_scans(&current, Some(&prev));
        let changes = report.changes().unwrap();

        assert_eq!(changes.summary, DiffSummary {
            total_scanned: 3,
            new_count: 1,
            vanished_count: 1,
            escalated_count: 1,
        });
        assert_eq!(changes.new_devices[0].ip, "10.0.0.4");
        assert_eq!(changes.vanished_devices[0].ip, "10.0.0.2");
        assert_eq!(changes.escalations[0].ip, "10.0.0.1");
    }

    #[test]
    fn test_inputs_untouched() {
        let prev = snapshot(vec![scored("10.0.0.1", 1)]);
        let prev_copy = prev.clone();
        let current = vec![scored("10.0.0.1", 7)];
        let current_copy = current.clone();

        let _ = diff_scans(&current, Some(&prev));
        assert_eq!(prev, prev_copy);
        assert_eq!(current, current_copy);
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let json = serde_json::to_string(&ChangeReport::NoBaseline).unwrap();
        assert_eq!(json, r#"{"status":"no_baseline"}"#);
    }
}
