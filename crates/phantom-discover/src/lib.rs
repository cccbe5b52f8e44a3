//! phantom-discover: Local network scanner for the Phantom device
//! intelligence pipeline.
//!
//! Wraps nmap and the neighbor table to find hosts and their open ports,
//! resolves manufacturers from the IEEE OUI registry, runs every host
//! through `phantom-intel`, compares the result with the previous snapshot
//! for the subnet and writes reports.

pub mod arp;
pub mod config;
pub mod error;
pub mod http_probe;
pub mod nmap_xml;
pub mod notify;
pub mod oui;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod scheduler;

pub use error::{DiscoverError, Result};
