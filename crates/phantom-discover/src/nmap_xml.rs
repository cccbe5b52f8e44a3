//! Nmap XML output deserialization.
//!
//! Both the ping sweep and the per-host port scan run with `-oX -`, so a
//! single set of `quick-xml` serde structs covers both. Only the elements
//! the pipeline consumes are modelled; everything else is ignored.

use phantom_core::Port;
use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
}

/// A single host from scan results.
#[derive(Debug, Clone, Deserialize)]
pub struct NmapHost {
    pub status: Option<HostStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub ports: Option<Ports>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostStatus {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<NmapPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPort {
    #[serde(rename = "@portid")]
    pub port_id: Port,
    pub state: PortState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
}

impl NmapHost {
    /// Extract the IPv4 address, if present.
    pub fn ipv4(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "ipv4")
            .map(|a| a.addr.as_str())
    }

    /// Check if the host is up.
    pub fn is_up(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "up")
    }

    /// Open ports in the order nmap reported them.
    pub fn open_ports(&self) -> Vec<Port> {
        self.ports
            .as_ref()
            .map(|p| {
                p.ports
                    .iter()
                    .filter(|port| port.state.state == "open")
                    .map(|port| port.port_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl NmapRun {
    /// IPv4 addresses of every host reported up.
    pub fn live_ipv4s(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|h| h.is_up())
            .filter_map(|h| h.ipv4())
            .map(str::to_string)
            .collect()
    }

    /// Open ports reported for `ip`; empty if nmap did not list the host.
    pub fn open_ports_for(&self, ip: &str) -> Vec<Port> {
        self.hosts
            .iter()
            .find(|h| h.ipv4() == Some(ip))
            .map(NmapHost::open_ports)
            .unwrap_or_default()
    }
}

/// Parse nmap XML bytes into a structured `NmapRun`.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| DiscoverError::XmlParse(format!("{e}")))
}
