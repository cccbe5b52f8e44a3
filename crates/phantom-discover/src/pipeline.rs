//! Per-host enrichment and the bounded worker pool.
//!
//! Each live IP is handled by its own tokio task:
//! neighbor lookup → OUI → port scan → optional HTTP probe → classify → score.
//! A semaphore caps how many hosts are in flight at once. Workers return
//! their record; the orchestrator collects the join handles in spawn order,
//! so nothing is shared mutably between tasks.
//!
//! A host that fails at any step degrades instead of failing the batch:
//! no MAC means an empty record, a failed port scan means no ports.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use phantom_core::{normalize_ports, DeviceRecord, Port};
use phantom_intel::{DeviceIntel, HttpHeaders};
use tokio::sync::Semaphore;

use crate::arp::NeighborTable;
use crate::config::DiscoverConfig;
use crate::error::Result;
use crate::http_probe::HttpProbe;
use crate::oui::OuiTable;
use crate::scanner::NmapScanner;

/// Source of raw host facts. Implemented over the system tools by
/// [`SystemProbe`]; tests substitute canned answers.
pub trait HostProbe: Send + Sync + 'static {
    /// Live hosts in `subnet`.
    fn discover_hosts(&self, subnet: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// MAC address from the neighbor table, `None` if there is no entry.
    fn mac_address(&self, ip: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Which of `ports` are open on `ip`.
    fn open_ports(&self, ip: &str, ports: &[Port]) -> impl Future<Output = Result<Vec<Port>>> + Send;

    /// Web interface response headers, best effort.
    fn http_headers(&self, ip: &str, open_ports: &[Port]) -> impl Future<Output = Option<HttpHeaders>> + Send;
}

/// nmap + arp + reqwest.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    scanner: NmapScanner,
    neighbors: NeighborTable,
    http: HttpProbe,
}

impl SystemProbe {
    pub fn new(scanner: NmapScanner, neighbors: NeighborTable, http: HttpProbe) -> Self {
        Self {
            scanner,
            neighbors,
            http,
        }
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self::new(
            NmapScanner::new(&config.nmap_path)
                .with_sweep_timing(config.host_timeout_ms, config.min_hostgroup),
            NeighborTable::new(&config.arp_path),
            HttpProbe::new(Duration::from_secs(config.http_timeout_secs)),
        )
    }

    pub fn scanner(&self) -> &NmapScanner {
        &self.scanner
    }
}

impl HostProbe for SystemProbe {
    async fn discover_hosts(&self, subnet: &str) -> Result<Vec<String>> {
        self.scanner.discover_hosts(subnet).await
    }

    async fn mac_address(&self, ip: &str) -> Result<Option<String>> {
        self.neighbors.mac_address(ip).await
    }

    async fn open_ports(&self, ip: &str, ports: &[Port]) -> Result<Vec<Port>> {
        self.scanner.scan_ports(ip, ports).await
    }

    async fn http_headers(&self, ip: &str, open_ports: &[Port]) -> Option<HttpHeaders> {
        self.http.fetch_headers(ip, open_ports).await
    }
}

/// Everything a worker needs, shared read-only behind an `Arc`.
pub struct Pipeline<P> {
    probe: P,
    intel: DeviceIntel,
    oui: OuiTable,
    scan_ports: Vec<Port>,
}

impl<P: HostProbe> Pipeline<P> {
    pub fn new(probe: P, intel: DeviceIntel, oui: OuiTable, scan_ports: Vec<Port>) -> Self {
        Self {
            probe,
            intel,
            oui,
            scan_ports,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn intel(&self) -> &DeviceIntel {
        &self.intel
    }

    /// Build the finished record for one host. Never fails.
    pub async fn process_ip(&self, ip: &str) -> DeviceRecord {
        let mac = match self.probe.mac_address(ip).await {
            Ok(Some(raw)) => match phantom_core::normalize_mac(&raw) {
                Ok(mac) => mac,
                Err(e) => {
                    tracing::warn!(ip = %ip, error = %e, "Unusable MAC, recording empty device");
                    return degraded_device(ip);
                }
            },
            Ok(None) => {
                tracing::debug!(ip = %ip, "No neighbor entry, recording empty device");
                return degraded_device(ip);
            }
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "MAC lookup failed, recording empty device");
                return degraded_device(ip);
            }
        };

        let mut device = DeviceRecord::new(ip);
        device.manufacturer = self.oui.manufacturer(Some(&mac));
        device.mac = Some(mac);

        device.open_ports = match self.probe.open_ports(ip, &self.scan_ports).await {
            Ok(ports) => normalize_ports(ports),
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "Port scan failed, continuing without ports");
                Vec::new()
            }
        };

        let headers = if self.intel.wants_http_probe(&device) {
            self.probe.http_headers(ip, &device.open_ports).await
        } else {
            None
        };

        self.intel.enrich(&mut device, headers.as_ref());

        tracing::debug!(
            ip = %device.ip,
            manufacturer = %device.manufacturer,
            ports = ?device.open_ports,
            score = device.risk_score,
            level = %device.risk_level,
            "Device processed"
        );

        device
    }

    /// Process every IP with at most `max_workers` hosts in flight.
    ///
    /// Returns one record per input IP. A worker that panics contributes
    /// an empty record for its IP.
    pub async fn process_network(self: &Arc<Self>, ips: Vec<String>, max_workers: usize) -> Vec<DeviceRecord> {
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut handles = Vec::with_capacity(ips.len());

        tracing::info!(hosts = ips.len(), workers = max_workers.max(1), "Processing devices");

        for ip in ips {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let task_ip = ip.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                pipeline.process_ip(&task_ip).await
            });
            handles.push((ip, handle));
        }

        let mut devices = Vec::with_capacity(handles.len());
        for (ip, handle) in handles {
            match handle.await {
                Ok(device) => devices.push(device),
                Err(e) => {
                    tracing::error!(ip = %ip, error = %e, "Device worker panicked");
                    devices.push(degraded_device(&ip));
                }
            }
        }

        devices
    }
}

/// The record for a host nothing could be learned about.
pub fn degraded_device(ip: &str) -> DeviceRecord {
    DeviceRecord::new(ip)
}
