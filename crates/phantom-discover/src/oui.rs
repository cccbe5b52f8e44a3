//! IEEE OUI registry: MAC prefix → manufacturer.
//!
//! Parses the public `oui.txt` export, which lists each assignment twice:
//! ```text
//! 50-C7-BF   (hex)        TP-LINK TECHNOLOGIES CO.,LTD.
//! 50C7BF     (base 16)    TP-LINK TECHNOLOGIES CO.,LTD.
//! ```
//! The table is built once at startup and shared read-only by all workers.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use phantom_core::{oui_prefix, UNKNOWN_MANUFACTURER};

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct OuiTable {
    entries: HashMap<String, String>,
}

impl OuiTable {
    /// Parse `oui.txt` content. Lines that are neither `(hex)` nor
    /// `(base 16)` assignments are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for line in text.lines() {
            let Some((prefix, vendor)) = split_assignment(line) else {
                continue;
            };
            let key: String = prefix
                .chars()
                .filter(|c| *c != '-')
                .collect::<String>()
                .to_ascii_uppercase();
            let vendor = vendor.trim();
            if key.len() == 6 && key.chars().all(|c| c.is_ascii_hexdigit()) && !vendor.is_empty() {
                entries.insert(key, vendor.to_string());
            }
        }

        Self { entries }
    }

    /// Load the registry from disk, falling back to an empty table.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let table = Self::parse(&text);
                tracing::info!(path = %path.display(), records = table.len(), "OUI records loaded");
                table
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "OUI database unavailable, manufacturers will be Unknown");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Manufacturer registered for the MAC's prefix.
    pub fn lookup(&self, mac: &str) -> Option<&str> {
        let prefix = oui_prefix(mac)?;
        self.entries.get(&prefix).map(String::as_str)
    }

    /// Manufacturer for an optional MAC, `"Unknown"` when unresolved.
    pub fn manufacturer(&self, mac: Option<&str>) -> String {
        mac.and_then(|m| self.lookup(m))
            .unwrap_or(UNKNOWN_MANUFACTURER)
            .to_string()
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    for marker in ["(base 16)", "(hex)"] {
        if let Some((prefix, vendor)) = line.split_once(marker) {
            return Some((prefix.trim(), vendor));
        }
    }
    None
}

/// Fetch the registry to `path` unless it already exists. Failures are
/// logged and leave the file absent.
pub async fn ensure_downloaded(path: &Path, url: &str, timeout: Duration) {
    if path.exists() || url.trim().is_empty() {
        return;
    }

    tracing::info!(url, path = %path.display(), "Downloading OUI database");
    match download(path, url, timeout).await {
        Ok(bytes) => tracing::info!(path = %path.display(), bytes, "OUI database downloaded"),
        Err(e) => tracing::warn!(url, error = %e, "OUI database download failed"),
    }
}

/// The IEEE registry host throttles requests without a user agent.
const REGISTRY_USER_AGENT: &str = concat!("phantom/", env!("CARGO_PKG_VERSION"));

fn registry_request(client: &reqwest::Client, url: &str) -> Result<reqwest::Request> {
    Ok(client
        .get(url)
        .header(reqwest::header::USER_AGENT, REGISTRY_USER_AGENT)
        .build()?)
}

async fn download(path: &Path, url: &str, timeout: Duration) -> Result<usize> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let request = registry_request(&client, url)?;
    let body = client
        .execute(request)
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &body).await?;
    Ok(body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUI_SAMPLE: &str = "\
OUI/MA-L                                                    Organization
company_id                                                  Organization
                                                            Address

50-C7-BF   (hex)\t\tTP-LINK TECHNOLOGIES CO.,LTD.
50C7BF     (base 16)\t\tTP-LINK TECHNOLOGIES CO.,LTD.
\t\t\t\tBuilding 24 (floors 1,3,4,5) and 28 (floors1-4)
\t\t\t\tShenzhen  Guangdong  518057
\t\t\t\tCN

4C-BD-8F   (hex)\t\tHangzhou Hikvision Digital Technology Co.,Ltd.
4CBD8F     (base 16)\t\tHangzhou Hikvision Digital Technology Co.,Ltd.
";

    #[test]
    fn test_parse_registry() {
        let table = OuiTable::parse(OUI_SAMPLE);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("50:c7:bf:12:34:56"), Some("TP-LINK TECHNOLOGIES CO.,LTD."));
        assert_eq!(
            table.lookup("4C-BD-8F-00-00-01"),
            Some("Hangzhou Hikvision Digital Technology Co.,Ltd.")
        );
    }

    #[test]
    fn test_unresolved_is_unknown() {
        let table = OuiTable::parse(OUI_SAMPLE);
        assert_eq!(table.manufacturer(Some("00:11:22:33:44:55")), "Unknown");
        assert_eq!(table.manufacturer(None), "Unknown");
        assert_eq!(table.manufacturer(Some("garbage")), "Unknown");
    }

    #[test]
    fn test_hex_only_lines_are_enough() {
        let table = OuiTable::parse("00-00-0C   (hex)\t\tCisco Systems, Inc\n");
        assert_eq!(table.manufacturer(Some("00:00:0C:01:02:03")), "Cisco Systems, Inc");
    }

    #[test]
    fn test_missing_file_gives_empty_table() {
        let table = OuiTable::load_or_empty("/nonexistent/oui.txt");
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oui.txt");
        std::fs::write(&path, OUI_SAMPLE).unwrap();
        assert_eq!(OuiTable::load_or_empty(&path).len(), 2);
    }

    #[test]
    fn test_registry_request_identifies_client() {
        let client = reqwest::Client::new();
        let request = registry_request(&client, "https://standards-oui.ieee.org/oui/oui.txt").unwrap();
        let agent = request.headers().get(reqwest::header::USER_AGENT).unwrap();
        assert!(agent.to_str().unwrap().starts_with("phantom/"));
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oui.txt");
        std::fs::write(&path, OUI_SAMPLE).unwrap();

        ensure_downloaded(&path, "http://127.0.0.1:9/oui.txt", Duration::from_millis(100)).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), OUI_SAMPLE);
    }
}
