//! Nmap process wrapper.
//!
//! Executes nmap as a child process via `tokio::process::Command` and
//! parses the XML output. Two invocations are used: a ping sweep over the
//! subnet, then one port scan per live host.

use std::net::Ipv4Addr;
use std::time::Instant;

use ipnet::Ipv4Net;
use phantom_core::Port;
use tokio::process::Command;

use crate::error::{DiscoverError, Result};
use crate::nmap_xml::{self, NmapRun};

/// Wrapper around the nmap binary.
#[derive(Debug, Clone)]
pub struct NmapScanner {
    nmap_path: String,
    host_timeout_ms: u64,
    min_hostgroup: u32,
}

impl NmapScanner {
    pub fn new(nmap_path: &str) -> Self {
        Self {
            nmap_path: nmap_path.to_string(),
            host_timeout_ms: 50,
            min_hostgroup: 20,
        }
    }

    /// Tune the ping sweep.
    pub fn with_sweep_timing(mut self, host_timeout_ms: u64, min_hostgroup: u32) -> Self {
        self.host_timeout_ms = host_timeout_ms;
        self.min_hostgroup = min_hostgroup;
        self
    }

    /// Verify nmap is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.nmap_path)
            .arg("--version")
            .output()
            .await
            .map_err(|_| DiscoverError::NmapNotFound {
                path: self.nmap_path.clone(),
            })?;

        String::from_utf8(output.stdout).map_err(|e| DiscoverError::XmlParse(e.to_string()))
    }

    /// Ping-sweep `subnet` and return the live host addresses, minus the
    /// subnet's network and broadcast addresses.
    pub async fn discover_hosts(&self, subnet: &str) -> Result<Vec<String>> {
        let net = parse_subnet(subnet)?;
        let start = Instant::now();

        tracing::info!(subnet = %net, "Starting host discovery");

        let run = self
            .run(&[
                "-sn".to_string(),
                "--host-timeout".to_string(),
                format!("{}ms", self.host_timeout_ms),
                "--min-hostgroup".to_string(),
                self.min_hostgroup.to_string(),
                net.to_string(),
            ])
            .await?;

        let hosts = usable_hosts(&run, &net);

        tracing::info!(
            subnet = %net,
            hosts_up = hosts.len(),
            duration_ms = start.elapsed().as_millis(),
            "Host discovery complete"
        );

        Ok(hosts)
    }

    /// Scan `ports` on a single host and return the open ones in report order.
    pub async fn scan_ports(&self, ip: &str, ports: &[Port]) -> Result<Vec<Port>> {
        if ports.is_empty() {
            return Ok(Vec::new());
        }

        let list = ports
            .iter()
            .map(Port::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let run = self.run(&["-p".to_string(), list, ip.to_string()]).await?;
        let open = run.open_ports_for(ip);

        tracing::debug!(ip = %ip, open = ?open, "Port scan complete");
        Ok(open)
    }

    /// Run nmap with `-oX -` appended to `args` and parse its XML.
    async fn run(&self, args: &[String]) -> Result<NmapRun> {
        let output = Command::new(&self.nmap_path)
            .args(args)
            .arg("-oX")
            .arg("-")
            .arg("--noninteractive")
            .output()
            .await
            .map_err(|e| DiscoverError::NmapNotFound {
                path: format!("{}: {e}", self.nmap_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DiscoverError::NmapFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        nmap_xml::parse_nmap_xml(&output.stdout)
    }
}

/// Parse a CIDR subnet. A bare address is treated as a /32.
pub fn parse_subnet(subnet: &str) -> Result<Ipv4Net> {
    let trimmed = subnet.trim();
    let parsed = if trimmed.contains('/') {
        trimmed.parse::<Ipv4Net>().map_err(|e| e.to_string())
    } else {
        trimmed
            .parse::<Ipv4Addr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| Ipv4Net::new(addr, 32).map_err(|e| e.to_string()))
    };

    parsed.map_err(|reason| DiscoverError::InvalidSubnet {
        subnet: subnet.to_string(),
        reason,
    })
}

/// Live hosts from a sweep, excluding addresses that cannot be a device.
pub fn usable_hosts(run: &NmapRun, net: &Ipv4Net) -> Vec<String> {
    let reserved: Vec<Ipv4Addr> = if net.prefix_len() < 31 {
        vec![net.network(), net.broadcast()]
    } else {
        Vec::new()
    };

    run.live_ipv4s()
        .into_iter()
        .filter(|ip| match ip.parse::<Ipv4Addr>() {
            Ok(addr) => !reserved.contains(&addr),
            Err(_) => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmap_xml::parse_nmap_xml;

    #[test]
    fn test_parse_subnet() {
        let net = parse_subnet("192.168.1.0/24").unwrap();
        assert_eq!(net.prefix_len(), 24);
        assert_eq!(parse_subnet(" 10.0.0.7 ").unwrap().prefix_len(), 32);
        assert!(matches!(
            parse_subnet("192.168.1.0/33"),
            Err(DiscoverError::InvalidSubnet { .. })
        ));
        assert!(parse_subnet("not-a-subnet").is_err());
    }

    #[test]
    fn test_usable_hosts_excludes_network_and_broadcast() {
        let xml = r#"<nmaprun>
  <host><status state="up"/><address addr="192.168.1.0" addrtype="ipv4"/></host>
  <host><status state="up"/><address addr="192.168.1.1" addrtype="ipv4"/></host>
  <host><status state="up"/><address addr="192.168.1.42" addrtype="ipv4"/></host>
  <host><status state="down"/><address addr="192.168.1.43" addrtype="ipv4"/></host>
  <host><status state="up"/><address addr="192.168.1.255" addrtype="ipv4"/></host>
</nmaprun>"#;
        let run = parse_nmap_xml(xml.as_bytes()).unwrap();
        let net = parse_subnet("192.168.1.0/24").unwrap();
        assert_eq!(usable_hosts(&run, &net), vec!["192.168.1.1", "192.168.1.42"]);
    }

    #[test]
    fn test_single_host_target_is_kept() {
        let xml = r#"<nmaprun>
  <host><status state="up"/><address addr="10.0.0.7" addrtype="ipv4"/></host>
</nmaprun>"#;
        let run = parse_nmap_xml(xml.as_bytes()).unwrap();
        let net = parse_subnet("10.0.0.7").unwrap();
        assert_eq!(usable_hosts(&run, &net), vec!["10.0.0.7"]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let scanner = NmapScanner::new("/nonexistent/nmap");
        assert!(matches!(
            scanner.verify_installation().await,
            Err(DiscoverError::NmapNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_port_list_skips_nmap() {
        let scanner = NmapScanner::new("/nonexistent/nmap");
        assert!(scanner.scan_ports("10.0.0.7", &[]).await.unwrap().is_empty());
    }
}
