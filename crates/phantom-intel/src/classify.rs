//! Device type classification.
//!
//! Three independent sub-rules contribute labels: manufacturer tables,
//! signature ports and the HTTP `Server` header. Their union is the
//! device's type set; an empty union becomes `{"unknown"}`.

use std::collections::{BTreeSet, HashMap, HashSet};

use phantom_core::{Port, UNKNOWN_DEVICE_TYPE};

use crate::rules::ClassifierRules;

/// HTTP response headers as returned by the header probe.
pub type HttpHeaders = HashMap<String, String>;

/// Manufacturer strings that carry no vendor information.
const PLACEHOLDER_MANUFACTURERS: &[&str] = &["", "unknown", "not found", "unknown manufacturer"];

pub struct Classifier {
    rules: ClassifierRules,
    router_vendors: HashSet<String>,
    camera_vendors: HashSet<String>,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self {
            router_vendors: lowercase_set(&rules.router_vendors),
            camera_vendors: lowercase_set(&rules.camera_vendors),
            rules,
        }
    }

    /// Whether the open ports warrant fetching HTTP headers.
    pub fn wants_http_probe(&self, open_ports: &[Port]) -> bool {
        open_ports
            .iter()
            .any(|p| self.rules.http_probe_ports.contains(p))
    }

    /// Classify a device from its facts.
    ///
    /// `headers` only contribute when a probe port is open. The result is
    /// never empty.
    pub fn classify(
        &self,
        manufacturer: &str,
        open_ports: &[Port],
        headers: Option<&HttpHeaders>,
    ) -> BTreeSet<String> {
        let mut types: BTreeSet<String> = BTreeSet::new();

        types.extend(self.by_manufacturer(manufacturer));
        types.extend(self.by_ports(open_ports));

        if self.wants_http_probe(open_ports) {
            if let Some(headers) = headers {
                types.extend(self.by_http_headers(headers));
            }
        }

        if types.is_empty() {
            types.insert(UNKNOWN_DEVICE_TYPE.to_string());
        }

        tracing::trace!(manufacturer, ports = ?open_ports, types = ?types, "Device classified");
        types
    }

    /// Labels implied by the manufacturer alone.
    pub fn by_manufacturer(&self, manufacturer: &str) -> Vec<String> {
        let name = manufacturer.trim().to_lowercase();
        if PLACEHOLDER_MANUFACTURERS.contains(&name.as_str()) {
            return Vec::new();
        }

        if self.router_vendors.contains(&name) {
            return vec!["router".to_string()];
        }
        if self.camera_vendors.contains(&name) {
            return vec!["camera".to_string()];
        }

        self.rules
            .vendor_substrings
            .iter()
            .find(|rule| rule.matches(&name))
            .map(|rule| rule.device_types.clone())
            .unwrap_or_default()
    }

    /// Labels whose signature ports intersect the open ports.
    pub fn by_ports(&self, open_ports: &[Port]) -> Vec<String> {
        self.rules
            .port_rules
            .iter()
            .filter(|(_, signature_ports)| open_ports.iter().any(|p| signature_ports.contains(p)))
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Labels implied by the `Server` response header.
    pub fn by_http_headers(&self, headers: &HttpHeaders) -> Vec<String> {
        let Some(server) = header_value(headers, "server") else {
            return Vec::new();
        };
        let server = server.to_lowercase();

        self.rules
            .server_header_rules
            .iter()
            .find(|rule| rule.matches(&server))
            .map(|rule| rule.device_types.clone())
            .unwrap_or_default()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierRules::default())
    }
}

fn lowercase_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|s| s.to_lowercase()).collect()
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SubstringRule;
    use std::collections::BTreeMap;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn headers(server: &str) -> HttpHeaders {
        HashMap::from([("Server".to_string(), server.to_string())])
    }

    #[test]
    fn test_manufacturer_exact_lists() {
        let c = Classifier::default();
        assert_eq!(c.by_manufacturer("TP-Link"), vec!["router"]);
        assert_eq!(c.by_manufacturer("  mikrotik "), vec!["router"]);
        assert_eq!(c.by_manufacturer("Hikvision"), vec!["camera"]);
        // Huawei is on the router list, which wins over the phone substrings.
        assert_eq!(c.by_manufacturer("Huawei"), vec!["router"]);
    }

    #[test]
    fn test_manufacturer_substrings() {
        let c = Classifier::default();
        assert_eq!(c.by_manufacturer("Apple, Inc."), vec!["smartphone"]);
        assert_eq!(c.by_manufacturer("Xiaomi Communications Co Ltd"), vec!["smartphone"]);
        assert_eq!(c.by_manufacturer("Dell Inc."), vec!["computer"]);
        assert_eq!(c.by_manufacturer("Seiko Epson Corporation"), vec!["printer"]);
        assert_eq!(c.by_manufacturer("Panasonic"), vec!["tv", "media-device"]);
    }

    #[test]
    fn test_placeholder_manufacturer_contributes_nothing() {
        let c = Classifier::default();
        assert!(c.by_manufacturer("Unknown").is_empty());
        assert!(c.by_manufacturer("Not found").is_empty());
        assert!(c.by_manufacturer("").is_empty());
        assert!(c.by_manufacturer("Raspberry Pi Foundation").is_empty());
    }

    #[test]
    fn test_ports_emit_every_matching_type() {
        let c = Classifier::default();
        let types: BTreeSet<String> = c.by_ports(&[53]).into_iter().collect();
        assert_eq!(types, set(&["dns-server", "server"]));

        let types: BTreeSet<String> = c.by_ports(&[23]).into_iter().collect();
        assert_eq!(types, set(&["remote-access", "router"]));

        assert!(c.by_ports(&[]).is_empty());
        assert!(c.by_ports(&[4444]).is_empty());
    }

    #[test]
    fn test_http_header_first_match_wins() {
        let c = Classifier::default();
        assert_eq!(c.by_http_headers(&headers("gSOAP/2.8")), vec!["camera"]);
        assert_eq!(
            c.by_http_headers(&headers("nginx/1.24.0")),
            vec!["router", "web-server"]
        );
        // "ipcam-gateway" hits the router rule before the camera rule.
        assert_eq!(c.by_http_headers(&headers("ipcam-gateway")), vec!["router"]);
        assert_eq!(c.by_http_headers(&headers("Synology")), vec!["nas", "storage"]);
        assert!(c.by_http_headers(&headers("lighttpd")).is_empty());
        assert!(c.by_http_headers(&HttpHeaders::new()).is_empty());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let c = Classifier::default();
        let h = HashMap::from([("server".to_string(), "micro_httpd".to_string())]);
        assert_eq!(c.by_http_headers(&h), vec!["printer"]);
    }

    #[test]
    fn test_classify_unions_sub_rules() {
        let c = Classifier::default();
        let types = c.classify("Hikvision", &[554, 80], Some(&headers("gSOAP/2.8")));
        assert!(types.contains("camera"));
        assert!(types.contains("router"));
        assert!(types.contains("streaming"));
        assert!(types.contains("web-server"));
        // camera emitted by three rules, stored once
        assert_eq!(types.iter().filter(|t| *t == "camera").count(), 1);
    }

    #[test]
    fn test_classify_ignores_headers_without_web_port() {
        let c = Classifier::default();
        let types = c.classify("Unknown", &[9999], Some(&headers("Synology")));
        assert_eq!(types, set(&["unknown"]));
    }

    #[test]
    fn test_classify_falls_back_to_unknown() {
        let c = Classifier::default();
        assert_eq!(c.classify("Unknown", &[], None), set(&["unknown"]));
        assert_eq!(c.classify("Acme Widgets", &[4444], None), set(&["unknown"]));
    }

    #[test]
    fn test_synthetic_rules() {
        let rules = ClassifierRules {
            router_vendors: vec![],
            camera_vendors: vec!["Acme".to_string()],
            vendor_substrings: vec![SubstringRule::new(&["robot"], &["vacuum"])],
            port_rules: BTreeMap::from([("game".to_string(), BTreeSet::from([3074]))]),
            server_header_rules: vec![],
            http_probe_ports: BTreeSet::new(),
        };
        let c = Classifier::new(rules);

        assert_eq!(c.classify("acme", &[], None), set(&["camera"]));
        assert_eq!(c.classify("RoboRock robot", &[3074], None), set(&["game", "vacuum"]));
        assert!(!c.wants_http_probe(&[80, 443]));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let c = Classifier::default();
        let h = headers("Apache/2.4");
        let ports = [22, 80, 445, 9100];
        let first = c.classify("Brother Industries", &ports, Some(&h));
        for _ in 0..5 {
            assert_eq!(c.classify("Brother Industries", &ports, Some(&h)), first);
        }
    }
}
