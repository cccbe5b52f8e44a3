//! Configuration for the phantom-discover scanner.

use phantom_core::Port;
use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from the `[discover]` section of `phantom.toml` or from
/// `PHANTOM__DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Path to the nmap binary (default: "nmap").
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Path to the arp binary (default: "arp").
    #[serde(default = "default_arp_path")]
    pub arp_path: String,

    /// Subnet scanned when none is given on the command line.
    #[serde(default = "default_subnet")]
    pub default_subnet: String,

    /// Ports probed on every live host.
    #[serde(default = "default_scan_ports")]
    pub scan_ports: Vec<Port>,

    /// Per-host timeout for the ping sweep, in milliseconds.
    #[serde(default = "default_host_timeout_ms")]
    pub host_timeout_ms: u64,

    /// Minimum nmap host group size for the ping sweep.
    #[serde(default = "default_min_hostgroup")]
    pub min_hostgroup: u32,

    /// Size of the per-host worker pool.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Hard timeout for the HTTP header probe, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// IEEE `oui.txt` location.
    #[serde(default = "default_oui_path")]
    pub oui_path: String,

    /// Where to fetch `oui.txt` from when it is missing. Empty disables the download.
    #[serde(default = "default_oui_url")]
    pub oui_url: String,

    /// Signature YAML document.
    #[serde(default = "default_signatures_path")]
    pub signatures_path: String,

    /// Directory for scan snapshots.
    #[serde(default = "default_history_dir")]
    pub history_dir: String,

    /// Directory for exportable JSON and CSV reports.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Also write one `<ip>_device.csv` per device into `export_dir`.
    #[serde(default)]
    pub export_csv: bool,

    /// Maximum concurrent subnet scans in daemon mode.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_scans: usize,

    /// Per-subnet scheduling configuration for daemon mode.
    #[serde(default)]
    pub subnets: Vec<SubnetSchedule>,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// A subnet with its scan schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct SubnetSchedule {
    /// CIDR target (e.g., "192.168.1.0/24").
    pub cidr: String,

    /// Human-readable name for this subnet.
    pub name: Option<String>,

    /// Scan interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Whether this subnet is enabled for scanning.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Telegram Bot API notification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    /// API base, overridable for testing against a local server.
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api(),
        }
    }
}

impl TelegramConfig {
    /// Enabled and has everything it needs to send.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_arp_path() -> String {
    "arp".to_string()
}

fn default_subnet() -> String {
    "192.168.1.0/24".to_string()
}

fn default_scan_ports() -> Vec<Port> {
    vec![
        21, 22, 23, 25, 53, 80, 110, 143, 443, 993, 995, // basic services
        554, 8000, 8080, 8081, 8443, // web and streaming
        2222, 3389, 5900, // remote access
        9100, 515, 631, // printing
        1433, 3306, 5432, 27017, 6379, // databases
        1883, 8883, 5683, 5684, // iot
        161, 162, 123, 137, 138, 139, 445, 67, 68, 514,
    ]
}

fn default_host_timeout_ms() -> u64 {
    50
}

fn default_min_hostgroup() -> u32 {
    20
}

fn default_max_workers() -> usize {
    10
}

fn default_http_timeout_secs() -> u64 {
    3
}

fn default_oui_path() -> String {
    "data/oui.txt".to_string()
}

fn default_oui_url() -> String {
    "https://standards-oui.ieee.org/oui/oui.txt".to_string()
}

fn default_signatures_path() -> String {
    "config/signatures.yaml".to_string()
}

fn default_history_dir() -> String {
    "./history".to_string()
}

fn default_export_dir() -> String {
    "./exportable_reports".to_string()
}

fn default_max_concurrent() -> usize {
    1
}

fn default_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            nmap_path: default_nmap_path(),
            arp_path: default_arp_path(),
            default_subnet: default_subnet(),
            scan_ports: default_scan_ports(),
            host_timeout_ms: default_host_timeout_ms(),
            min_hostgroup: default_min_hostgroup(),
            max_workers: default_max_workers(),
            http_timeout_secs: default_http_timeout_secs(),
            oui_path: default_oui_path(),
            oui_url: default_oui_url(),
            signatures_path: default_signatures_path(),
            history_dir: default_history_dir(),
            export_dir: default_export_dir(),
            export_csv: false,
            max_concurrent_scans: default_max_concurrent(),
            subnets: Vec::new(),
            telegram: TelegramConfig::default(),
        }
    }
}
