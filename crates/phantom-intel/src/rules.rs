//! Built-in rule tables for classification and risk scoring.
//!
//! Each table is an immutable struct handed to its component at
//! construction. `Default` yields the stock tables; tests and deployments
//! can pass synthetic ones instead.

use std::collections::{BTreeMap, BTreeSet};

use phantom_core::Port;
use serde::{Deserialize, Serialize};

/// An ordered substring rule: if any needle occurs in the haystack,
/// the listed device types are emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubstringRule {
    pub needles: Vec<String>,
    pub device_types: Vec<String>,
}

impl SubstringRule {
    pub fn new(needles: &[&str], device_types: &[&str]) -> Self {
        Self {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            device_types: device_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether any needle occurs in `haystack`. Both sides are expected lower-case.
    pub fn matches(&self, haystack: &str) -> bool {
        self.needles.iter().any(|n| haystack.contains(n.as_str()))
    }
}

/// Lookup tables used by the `Classifier`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierRules {
    /// Exact (case-insensitive) vendor names emitted as `router`.
    pub router_vendors: Vec<String>,
    /// Exact (case-insensitive) vendor names emitted as `camera`.
    pub camera_vendors: Vec<String>,
    /// Tried in order after the exact lists; first hit wins.
    pub vendor_substrings: Vec<SubstringRule>,
    /// Device type → signature ports. Any open port in the set emits the type.
    pub port_rules: BTreeMap<String, BTreeSet<Port>>,
    /// Matched against the lower-cased `Server` header; first hit wins.
    pub server_header_rules: Vec<SubstringRule>,
    /// Ports that make a host worth an HTTP header probe.
    pub http_probe_ports: BTreeSet<Port>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            router_vendors: strings(&[
                "TP-Link", "Cisco", "ASUS", "Ubiquiti", "Netgear", "Linksys", "D-Link",
                "Belkin", "Buffalo", "ZyXEL", "MikroTik", "Huawei", "ZTE", "Fritz!Box", "AVM",
                "Technicolor", "Sagemcom",
            ]),
            camera_vendors: strings(&[
                "Hikvision", "Dahua", "Reolink", "Axis", "Foscam", "Amcrest", "Wyze", "Ring",
                "Arlo", "Nest", "Eufy", "Blink", "Vivint",
            ]),
            vendor_substrings: vec![
                SubstringRule::new(
                    &["apple", "samsung", "huawei", "xiaomi", "oneplus"],
                    &["smartphone"],
                ),
                SubstringRule::new(
                    &["dell", "hp", "lenovo", "asus", "acer", "msi"],
                    &["computer"],
                ),
                SubstringRule::new(&["canon", "epson", "brother"], &["printer"]),
                SubstringRule::new(
                    &["sony", "lg", "philips", "panasonic"],
                    &["tv", "media-device"],
                ),
            ],
            port_rules: port_table(&[
                ("camera", &[554, 8000, 8080, 8081, 8443, 37777, 37778, 37779]),
                ("router", &[80, 443, 8080, 8443, 22, 23]),
                ("server", &[22, 80, 443, 21, 25, 53, 1433, 3306, 5432, 27017, 6379]),
                ("printer", &[9100, 515, 631, 80, 443]),
                ("nas", &[21, 22, 80, 443, 139, 445, 548, 873, 2049]),
                ("smartphone", &[22, 80, 443, 8080, 8443]),
                ("computer", &[22, 80, 443, 3389, 5900, 139, 445]),
                ("tv", &[80, 443, 8080, 8443, 8008, 8009]),
                ("iot", &[1883, 8883, 5683, 5684, 161, 162, 123, 514]),
                ("database", &[1433, 3306, 5432, 27017, 6379, 1521]),
                ("web-server", &[80, 443, 8080, 8443, 3000, 5000, 8000]),
                ("mail-server", &[25, 110, 143, 993, 995, 587]),
                ("dns-server", &[53]),
                ("dhcp-server", &[67, 68]),
                ("file-server", &[21, 22, 139, 445, 548, 873, 2049]),
                ("remote-access", &[22, 23, 3389, 5900, 2222]),
                ("streaming", &[554, 8000, 8080, 8081, 8443]),
                ("monitoring", &[161, 162, 514, 123, 1883, 8883]),
            ]),
            server_header_rules: vec![
                SubstringRule::new(&["gsoap", "axis"], &["camera"]),
                SubstringRule::new(&["nginx", "apache"], &["router", "web-server"]),
                SubstringRule::new(&["micro_httpd", "printer"], &["printer"]),
                SubstringRule::new(&["router", "gateway"], &["router"]),
                SubstringRule::new(&["camera", "ipcam"], &["camera"]),
                SubstringRule::new(&["nas", "synology"], &["nas", "storage"]),
            ],
            http_probe_ports: BTreeSet::from([80, 443]),
        }
    }
}

/// Weight tables used by the `RiskAssessor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RiskRules {
    /// Per-port weight. Ports not listed weigh `default_port_weight`.
    pub port_weights: BTreeMap<Port, u32>,
    pub default_port_weight: u32,
    /// Bonus added when the manufacturer is a known vendor (case-insensitive).
    pub manufacturer_weights: BTreeMap<String, u32>,
}

impl Default for RiskRules {
    fn default() -> Self {
        let port_weights = BTreeMap::from([
            // Remote administration
            (22, 5),
            (23, 8),
            (21, 6),
            (3389, 6),
            (5900, 5),
            // Web interfaces
            (80, 3),
            (443, 3),
            (8080, 3),
            (8443, 3),
            (8000, 4),
            (8081, 4),
            // Cameras
            (554, 7),
            (37777, 7),
            (37778, 7),
            (37779, 7),
            // Databases
            (1433, 6),
            (3306, 5),
            (5432, 5),
            (27017, 5),
            (6379, 4),
            // Network services
            (53, 2),
            (67, 2),
            (161, 4),
            (162, 4),
            (123, 2),
            (514, 3),
            // File sharing
            (139, 4),
            (445, 4),
            (548, 3),
            // IoT protocols
            (1883, 4),
            (8883, 4),
            (5683, 3),
            (5684, 3),
            // Printing
            (9100, 4),
            (515, 3),
            (631, 3),
        ]);

        let manufacturer_weights = [
            ("Hikvision", 7),
            ("Dahua", 6),
            ("Axis", 5),
            ("Foscam", 6),
            ("Amcrest", 5),
            ("TP-Link", 5),
            ("Netgear", 5),
            ("Linksys", 4),
            ("D-Link", 4),
            ("Cisco", 3),
            ("Ubiquiti", 3),
            ("Apple", 1),
            ("Samsung", 1),
            ("Google", 1),
            ("Amazon", 2),
            ("Xiaomi", 2),
            ("Huawei", 2),
            ("Dell", 2),
            ("HP", 2),
            ("Lenovo", 2),
            ("ASUS", 2),
            ("Acer", 2),
            ("Canon", 3),
            ("Epson", 3),
            ("Brother", 3),
            ("Xerox", 3),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            port_weights,
            default_port_weight: 1,
            manufacturer_weights,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn port_table(rows: &[(&str, &[Port])]) -> BTreeMap<String, BTreeSet<Port>> {
    rows.iter()
        .map(|(label, ports)| (label.to_string(), ports.iter().copied().collect()))
        .collect()
}
