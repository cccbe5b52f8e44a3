//! Core domain types for the Phantom scanner.
//!
//! A `DeviceRecord` is created when a host is discovered, enriched by the
//! classifier and risk assessor, and frozen once it lands in a
//! `ScanSnapshot`. Loose input (string ports, legacy snapshot keys) is
//! normalized here during deserialization so downstream code only ever sees
//! typed values.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PhantomError, Result};

/// A TCP port number.
pub type Port = u16;

/// Manufacturer used when the OUI lookup fails.
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";

/// Device type label used when no classification rule fires.
pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

/// Timestamp layout written by older, unsealed snapshots (no zone, read as UTC).
pub const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lowest score mapped to `RiskLevel::Medium`.
pub const MEDIUM_RISK_SCORE: u32 = 5;

/// Lowest score mapped to `RiskLevel::High`.
pub const HIGH_RISK_SCORE: u32 = 10;

// ── Risk ──────────────────────────────────────────────────────────

/// Discrete risk tier derived from a risk score.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a score onto its tier. Lower bounds are inclusive.
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_RISK_SCORE {
            Self::High
        } else if score >= MEDIUM_RISK_SCORE {
            Self::Medium
        } else if score > 0 {
            Self::Low
        } else {
            Self::None
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

// ── Device ────────────────────────────────────────────────────────

/// One discovered host and everything the pipeline learned about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Dotted-quad address, unique within a scan.
    pub ip: String,
    /// Uppercase colon-separated MAC, `None` when the neighbor table had no entry.
    #[serde(default, deserialize_with = "deserialize_mac")]
    pub mac: Option<String>,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    /// Open ports in discovery order.
    #[serde(default, alias = "open ports", deserialize_with = "deserialize_ports")]
    pub open_ports: Vec<Port>,
    #[serde(default = "default_device_types", alias = "device type")]
    pub device_types: BTreeSet<String>,
    #[serde(default, alias = "score")]
    pub risk_score: u32,
    #[serde(default, alias = "level")]
    pub risk_level: RiskLevel,
}

impl DeviceRecord {
    /// A freshly discovered host with no facts attached yet.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: None,
            manufacturer: default_manufacturer(),
            open_ports: Vec::new(),
            device_types: default_device_types(),
            risk_score: 0,
            risk_level: RiskLevel::None,
        }
    }
}

fn default_manufacturer() -> String {
    UNKNOWN_MANUFACTURER.to_string()
}

fn default_device_types() -> BTreeSet<String> {
    BTreeSet::from([UNKNOWN_DEVICE_TYPE.to_string()])
}

// ── Signature ─────────────────────────────────────────────────────

/// A declarative detection rule loaded from the signature document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: SignatureConditions,
    #[serde(default)]
    pub cve_info: Option<String>,
}

impl Signature {
    /// True when neither clause is present, i.e. the rule matches every device.
    pub fn is_unconditional(&self) -> bool {
        self.conditions.manufacturer.is_empty() && self.conditions.ports.is_empty()
    }
}

/// Match clauses of a signature. An empty clause is a wildcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureConditions {
    #[serde(default, deserialize_with = "deserialize_string_set")]
    pub manufacturer: BTreeSet<String>,
    #[serde(default, deserialize_with = "deserialize_port_set")]
    pub ports: BTreeSet<Port>,
}

// ── Snapshot ──────────────────────────────────────────────────────

/// A persisted, timestamped record of all devices found in one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSnapshot {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub subnet: String,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    /// BLAKE3 content hash (hex), set when the snapshot is sealed for storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ScanSnapshot {
    pub fn new(subnet: impl Into<String>, devices: Vec<DeviceRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            subnet: subnet.into(),
            devices,
            content_hash: None,
        }
    }

    /// Look up a device by IP.
    pub fn device(&self, ip: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.ip == ip)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ── Normalization ─────────────────────────────────────────────────

/// A port as it appears in loosely typed input: a number or a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawPort {
    Number(i64),
    Text(String),
}

impl RawPort {
    pub fn to_port(&self) -> Result<Port> {
        match self {
            Self::Number(n) => Port::try_from(*n).map_err(|_| PhantomError::InvalidPort(n.to_string())),
            Self::Text(s) => s
                .trim()
                .parse::<Port>()
                .map_err(|_| PhantomError::InvalidPort(s.clone())),
        }
    }
}

impl From<Port> for RawPort {
    fn from(port: Port) -> Self {
        Self::Number(i64::from(port))
    }
}

impl From<&str> for RawPort {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Coerce raw ports to integers, keeping first-seen order.
///
/// Unparseable entries and repeats are dropped; the former are logged.
pub fn normalize_ports<I>(raw: I) -> Vec<Port>
where
    I: IntoIterator,
    I::Item: Into<RawPort>,
{
    let mut seen = BTreeSet::new();
    let mut ports = Vec::new();

    for item in raw {
        match item.into().to_port() {
            Ok(port) => {
                if seen.insert(port) {
                    ports.push(port);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unparseable port"),
        }
    }

    ports
}

/// Canonicalize a MAC address to uppercase colon-separated hex.
///
/// Accepts `:`, `-` or `.` separators, or none.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect::<String>()
        .to_ascii_uppercase();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PhantomError::InvalidMac(raw.to_string()));
    }

    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Ok(octets.join(":"))
}

/// Extract the 6-hex-digit organizationally unique identifier from a MAC.
pub fn oui_prefix(mac: &str) -> Option<String> {
    let hex: String = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();

    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then_some(hex)
}

fn deserialize_ports<'de, D>(deserializer: D) -> std::result::Result<Vec<Port>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawPort>> = Option::deserialize(deserializer)?;
    Ok(normalize_ports(raw.unwrap_or_default()))
}

fn deserialize_port_set<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<Port>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_ports(deserializer)?.into_iter().collect())
}

fn deserialize_string_set<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().collect())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return Ok(ts);
    }
    NaiveDateTime::parse_from_str(raw.trim(), LEGACY_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

// Older snapshots stored "Not found" for hosts without a neighbor entry.
fn deserialize_mac<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| normalize_mac(&s).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::None);
        assert_eq!(RiskLevel::from_score(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(4), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(10), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(250), RiskLevel::High);
    }

    #[test]
    fn risk_level_is_ordinal() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn normalize_ports_mixed_input() {
        let raw = vec![
            RawPort::Number(80),
            RawPort::Text("443".to_string()),
            RawPort::Text(" 22 ".to_string()),
            RawPort::Text("ssh".to_string()),
            RawPort::Number(70_000),
            RawPort::Number(80),
        ];
        assert_eq!(normalize_ports(raw), vec![80, 443, 22]);
    }

    #[test]
    fn normalize_mac_formats() {
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-01").unwrap(), "AA:BB:CC:DD:EE:01");
        assert_eq!(normalize_mac("aabb.ccdd.ee02").unwrap(), "AA:BB:CC:DD:EE:02");
        assert!(normalize_mac("(incomplete)").is_err());
        assert!(normalize_mac("AA:BB:CC").is_err());
    }

    #[test]
    fn oui_prefix_extraction() {
        assert_eq!(oui_prefix("00:17:f2:01:02:03").as_deref(), Some("0017F2"));
        assert_eq!(oui_prefix("00-12-47-11-22-33").as_deref(), Some("001247"));
        assert_eq!(oui_prefix("123"), None);
        assert_eq!(oui_prefix("ZZ:ZZ:ZZ:00:00:00"), None);
    }

    #[test]
    fn new_device_defaults() {
        let device = DeviceRecord::new("10.0.0.1");
        assert_eq!(device.manufacturer, UNKNOWN_MANUFACTURER);
        assert!(device.mac.is_none());
        assert!(device.open_ports.is_empty());
        assert_eq!(device.device_types, BTreeSet::from(["unknown".to_string()]));
        assert_eq!(device.risk_level, RiskLevel::None);
    }

    #[test]
    fn device_record_accepts_legacy_keys() {
        let json = r#"{
            "ip": "192.168.1.20",
            "mac": "Not found",
            "manufacturer": "Hikvision",
            "open ports": ["554", "80"],
            "device type": ["camera", "router"],
            "score": 17,
            "level": "High"
        }"#;

        let device: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(device.mac, None);
        assert_eq!(device.open_ports, vec![554, 80]);
        assert!(device.device_types.contains("camera"));
        assert_eq!(device.risk_score, 17);
        assert_eq!(device.risk_level, RiskLevel::High);
    }

    #[test]
    fn snapshot_accepts_legacy_timestamp() {
        let json = r#"{
            "timestamp": "2023-11-14 22:13:20",
            "subnet": "192.168.1.0/24",
            "devices": []
        }"#;

        let snapshot = ScanSnapshot::from_json(json.as_bytes()).unwrap();
        assert_eq!(snapshot.timestamp, Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap());
        assert!(snapshot.content_hash.is_none());

        let bad = r#"{"timestamp": "yesterday", "subnet": "10.0.0.0/24"}"#;
        assert!(ScanSnapshot::from_json(bad.as_bytes()).is_err());
    }

    #[test]
    fn signature_ports_normalized_once() {
        let json = r#"{
            "name": "Telnet exposed",
            "conditions": { "ports": [23, "2323"] }
        }"#;

        let sig: Signature = serde_json::from_str(json).unwrap();
        assert_eq!(sig.conditions.ports, BTreeSet::from([23, 2323]));
        assert!(sig.conditions.manufacturer.is_empty());
        assert!(sig.cve_info.is_none());
        assert!(!sig.is_unconditional());
    }

    #[test]
    fn snapshot_json_roundtrip_keeps_devices() {
        let mut device = DeviceRecord::new("10.0.0.5");
        device.open_ports = vec![22, 80];
        device.risk_score = 8;
        device.risk_level = RiskLevel::Medium;

        let snapshot = ScanSnapshot::new("10.0.0.0/24", vec![device.clone()]);
        let json = snapshot.to_json_pretty().unwrap();
        assert!(!json.contains("content_hash"));

        let parsed = ScanSnapshot::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed.subnet, "10.0.0.0/24");
        assert_eq!(parsed.device("10.0.0.5"), Some(&device));
        assert!(parsed.device("10.0.0.6").is_none());
    }
}
