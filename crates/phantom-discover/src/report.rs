//! Human-readable scan output and exportable report files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use phantom_core::{DeviceRecord, Signature};
use phantom_intel::{ChangeReport, DeviceIntel};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

const SEPARATOR: &str = "--------------------------------------------------";

/// A signature hit as it appears in exported reports.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureHit {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_info: Option<String>,
}

impl From<&Signature> for SignatureHit {
    fn from(sig: &Signature) -> Self {
        Self {
            name: sig.name.clone(),
            description: sig.description.clone(),
            cve_info: sig.cve_info.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedDevice {
    #[serde(flatten)]
    pub device: DeviceRecord,
    pub signatures: Vec<SignatureHit>,
}

/// The document written to the export directory after every scan.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub scan_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub subnet: String,
    pub devices: Vec<ExportedDevice>,
    pub changes: ChangeReport,
}

impl ExportReport {
    pub fn build(
        scan_id: Uuid,
        timestamp: DateTime<Utc>,
        subnet: &str,
        devices: &[DeviceRecord],
        intel: &DeviceIntel,
        changes: &ChangeReport,
    ) -> Self {
        let devices = devices
            .iter()
            .map(|d| ExportedDevice {
                device: d.clone(),
                signatures: intel
                    .match_signatures(d)
                    .into_iter()
                    .map(SignatureHit::from)
                    .collect(),
            })
            .collect();

        Self {
            scan_id,
            timestamp,
            subnet: subnet.to_string(),
            devices,
            changes: changes.clone(),
        }
    }

    /// Devices at or above the High threshold.
    pub fn high_risk_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.device.risk_level == phantom_core::RiskLevel::High)
            .count()
    }
}

/// Write `report` to `dir/scan_<unix-seconds>.json`.
pub fn export_json(report: &ExportReport, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(format!("scan_{}.json", report.timestamp.timestamp()));
    fs::write(&path, serde_json::to_string_pretty(report)?)?;

    tracing::info!(path = %path.display(), devices = report.devices.len(), "Exportable report saved");
    Ok(path)
}

/// Write a single device to `dir/<ip>_device.csv`.
pub fn write_csv_report(device: &DeviceRecord, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let row = [
        device.ip.clone(),
        device.mac.clone().unwrap_or_else(|| "Not found".to_string()),
        device.manufacturer.clone(),
        join_or_none(device.open_ports.iter().map(|p| p.to_string())),
        join_or_none(device.device_types.iter().cloned()),
        device.risk_score.to_string(),
        device.risk_level.to_string(),
    ];

    let mut out = String::from("ip,mac,manufacturer,open_ports,device_type,score,level\n");
    let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
    out.push_str(&fields.join(","));
    out.push('\n');

    let path = dir.join(format!("{}_device.csv", device.ip));
    fs::write(&path, out)?;

    tracing::debug!(path = %path.display(), "CSV report saved");
    Ok(path)
}

/// One device block for terminal output.
pub fn render_device(device: &DeviceRecord, matches: &[&Signature]) -> String {
    let mut lines = vec![
        format!("IP: {}", device.ip),
        format!("MAC: {}", device.mac.as_deref().unwrap_or("Not found")),
        format!("Manufacturer: {}", device.manufacturer),
        format!(
            "Open ports: {}",
            join_or_none(device.open_ports.iter().map(|p| p.to_string()))
        ),
        format!(
            "Device type: {}",
            join_or_none(device.device_types.iter().cloned())
        ),
        format!("Risk level: {} ({})", device.risk_level, device.risk_score),
    ];

    if !matches.is_empty() {
        lines.push("Signature matches:".to_string());
        lines.extend(matches.iter().map(|sig| render_signature(sig)));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn render_signature(sig: &Signature) -> String {
    let mut line = format!("  - {}", sig.name);
    if !sig.description.is_empty() {
        line.push_str(&format!(": {}", sig.description));
    }
    if let Some(cve) = &sig.cve_info {
        line.push_str(&format!(" [{cve}]"));
    }
    line
}

/// Every device, separated by rule lines.
pub fn render_scan(devices: &[DeviceRecord], intel: &DeviceIntel) -> String {
    let mut out = String::new();
    for device in devices {
        out.push_str(&render_device(device, &intel.match_signatures(device)));
        out.push_str(SEPARATOR);
        out.push('\n');
    }
    out
}

/// The change report for terminal output.
pub fn render_changes(report: &ChangeReport) -> String {
    let Some(changes) = report.changes() else {
        return "No previous scan to compare against.\n".to_string();
    };

    if changes.is_empty() {
        return "No changes since the previous scan.\n".to_string();
    }

    let mut lines = Vec::new();
    if !changes.new_devices.is_empty() {
        lines.push("New devices:".to_string());
        lines.extend(
            changes
                .new_devices
                .iter()
                .map(|d| format!("  + {} ({}, {})", d.ip, d.manufacturer, d.risk_level)),
        );
    }
    if !changes.vanished_devices.is_empty() {
        lines.push("Vanished devices:".to_string());
        lines.extend(
            changes
                .vanished_devices
                .iter()
                .map(|d| format!("  - {} ({})", d.ip, d.manufacturer)),
        );
    }
    if !changes.escalations.is_empty() {
        lines.push("Risk escalations:".to_string());
        lines.extend(changes.escalations.iter().map(|e| {
            format!(
                "  ! {}: {} ({}) → {} ({})",
                e.ip, e.previous_level, e.previous_score, e.current_level, e.current_score
            )
        }));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn join_or_none(items: impl Iterator<Item = String>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "None".to_string()
    } else {
        joined
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use phantom_core::{RiskLevel, ScanSnapshot};
    use phantom_intel::signatures::parse_signatures;
    use phantom_intel::{diff_scans, SignatureSet};

    fn camera() -> DeviceRecord {
        let mut d = DeviceRecord::new("192.168.1.64");
        d.mac = Some("4C:BD:8F:00:00:01".to_string());
        d.manufacturer = "Hikvision".to_string();
        d.open_ports = vec![80, 554];
        d
    }

    fn intel() -> DeviceIntel {
        let sigs = parse_signatures(
            r#"
signatures:
  - name: Hikvision RTSP
    description: Camera stream reachable
    conditions:
      manufacturer: [Hikvision]
      ports: [554]
    cve_info: CVE-2017-7921
"#,
        )
        .unwrap();
        DeviceIntel::new().with_signatures(SignatureSet::new(sigs))
    }

    fn enriched_camera(intel: &DeviceIntel) -> DeviceRecord {
        let mut d = camera();
        intel.enrich(&mut d, None);
        d
    }

    #[test]
    fn test_render_device_with_match() {
        let intel = intel();
        let d = enriched_camera(&intel);
        let text = render_device(&d, &intel.match_signatures(&d));

        assert!(text.contains("IP: 192.168.1.64"));
        assert!(text.contains("Open ports: 80, 554"));
        assert!(text.contains("Risk level: High (17)"));
        assert!(text.contains("Hikvision RTSP: Camera stream reachable [CVE-2017-7921]"));
    }

    #[test]
    fn test_render_silent_device() {
        let text = render_device(&DeviceRecord::new("10.0.0.9"), &[]);
        assert!(text.contains("MAC: Not found"));
        assert!(text.contains("Open ports: None"));
        assert!(text.contains("Device type: unknown"));
        assert!(!text.contains("Signature matches"));
    }

    #[test]
    fn test_render_changes() {
        assert_eq!(
            render_changes(&ChangeReport::NoBaseline),
            "No previous scan to compare against.\n"
        );

        let mut before = DeviceRecord::new("10.0.0.5");
        before.risk_score = 3;
        before.risk_level = RiskLevel::Low;
        let mut after = before.clone();
        after.risk_score = 8;
        after.risk_level = RiskLevel::Medium;

        let report = diff_scans(&[after], Some(&ScanSnapshot::new("10.0.0.0/24", vec![before])));
        let text = render_changes(&report);
        assert!(text.contains("10.0.0.5: Low (3) → Medium (8)"));

        let report = diff_scans(
            &[DeviceRecord::new("10.0.0.9")],
            Some(&ScanSnapshot::new("10.0.0.0/24", vec![DeviceRecord::new("10.0.0.2")])),
        );
        assert_eq!(
            render_changes(&report),
            "New devices:\n  + 10.0.0.9 (Unknown, None)\nVanished devices:\n  - 10.0.0.2 (Unknown)\n"
        );
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let intel = intel();
        let devices = vec![enriched_camera(&intel), DeviceRecord::new("192.168.1.50")];
        let ts = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();

        let report = ExportReport::build(
            Uuid::new_v4(),
            ts,
            "192.168.1.0/24",
            &devices,
            &intel,
            &ChangeReport::NoBaseline,
        );
        assert_eq!(report.high_risk_count(), 1);

        let path = export_json(&report, dir.path().join("exports")).unwrap();
        assert_eq!(path.file_name().unwrap(), format!("scan_{}.json", ts.timestamp()).as_str());

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["devices"][0]["ip"], "192.168.1.64");
        assert_eq!(value["devices"][0]["signatures"][0]["cve_info"], "CVE-2017-7921");
        assert_eq!(value["devices"][1]["signatures"].as_array().unwrap().len(), 0);
        assert_eq!(value["changes"]["status"], "no_baseline");
    }

    #[test]
    fn test_write_csv_report() {
        let dir = tempfile::tempdir().unwrap();
        let intel = intel();
        let path = write_csv_report(&enriched_camera(&intel), dir.path()).unwrap();

        assert!(path.ends_with("192.168.1.64_device.csv"));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "ip,mac,manufacturer,open_ports,device_type,score,level");
        assert!(lines[1].starts_with("192.168.1.64,4C:BD:8F:00:00:01,Hikvision,\"80, 554\","));
        assert!(lines[1].ends_with(",17,High"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Cisco Systems, Inc"), "\"Cisco Systems, Inc\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
