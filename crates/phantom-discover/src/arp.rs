//! Neighbor table lookup via the `arp` utility.
//!
//! Handles both the Linux net-tools table layout and the BSD/macOS
//! one-line form, which drops leading zeros from octets:
//! ```text
//! 192.168.1.1    ether   50:c7:bf:00:00:01   C   eth0
//! ? (192.168.1.1) at 50:c7:bf:0:0:1 on en0 ifscope [ethernet]
//! ```

use tokio::process::Command;

use crate::error::{DiscoverError, Result};

#[derive(Debug, Clone)]
pub struct NeighborTable {
    arp_path: String,
}

impl NeighborTable {
    pub fn new(arp_path: &str) -> Self {
        Self {
            arp_path: arp_path.to_string(),
        }
    }

    /// MAC address for `ip`, uppercase and colon-separated. `Ok(None)`
    /// when the table has no complete entry.
    pub async fn mac_address(&self, ip: &str) -> Result<Option<String>> {
        let output = Command::new(&self.arp_path)
            .arg("-n")
            .arg(ip)
            .output()
            .await
            .map_err(|e| DiscoverError::Arp {
                ip: ip.to_string(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mac = parse_arp_output(&stdout, ip);
        tracing::debug!(ip = %ip, mac = ?mac, "Neighbor lookup");
        Ok(mac)
    }
}

/// Find the MAC for `ip` in `arp` output.
pub fn parse_arp_output(output: &str, ip: &str) -> Option<String> {
    let bracketed = format!("({ip})");

    output
        .lines()
        .filter(|line| {
            line.split_whitespace()
                .any(|token| token == ip || token == bracketed)
        })
        .flat_map(str::split_whitespace)
        .find_map(mac_from_token)
}

fn mac_from_token(token: &str) -> Option<String> {
    let octets: Vec<&str> = token.split([':', '-']).collect();
    if octets.len() != 6 {
        return None;
    }

    let mut padded = Vec::with_capacity(6);
    for octet in octets {
        if octet.is_empty() || octet.len() > 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        padded.push(format!("{:0>2}", octet.to_ascii_uppercase()));
    }

    Some(padded.join(":"))
}
