//! Risk scoring.
//!
//! Score = Σ port weight over distinct open ports (unlisted ports weigh
//! `default_port_weight`) + manufacturer bonus. The score is unbounded and
//! never decreases when a port is added. Levels use inclusive lower bounds:
//! 0 → None, 1..=4 → Low, 5..=9 → Medium, ≥10 → High.

use std::collections::{BTreeSet, HashMap};

use phantom_core::{DeviceRecord, Port, RiskLevel};

use crate::rules::RiskRules;

pub struct RiskAssessor {
    rules: RiskRules,
    manufacturer_weights: HashMap<String, u32>,
}

impl RiskAssessor {
    pub fn new(rules: RiskRules) -> Self {
        let manufacturer_weights = rules
            .manufacturer_weights
            .iter()
            .map(|(name, weight)| (name.to_lowercase(), *weight))
            .collect();
        Self {
            rules,
            manufacturer_weights,
        }
    }

    /// Compute the score for a manufacturer and port list.
    pub fn score(&self, manufacturer: &str, open_ports: &[Port]) -> u32 {
        let distinct: BTreeSet<Port> = open_ports.iter().copied().collect();

        let port_score = distinct.iter().fold(0u32, |acc, port| {
            acc.saturating_add(self.port_weight(*port))
        });

        port_score.saturating_add(self.manufacturer_bonus(manufacturer))
    }

    pub fn port_weight(&self, port: Port) -> u32 {
        self.rules
            .port_weights
            .get(&port)
            .copied()
            .unwrap_or(self.rules.default_port_weight)
    }

    pub fn manufacturer_bonus(&self, manufacturer: &str) -> u32 {
        self.manufacturer_weights
            .get(&manufacturer.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn level(&self, score: u32) -> RiskLevel {
        RiskLevel::from_score(score)
    }

    /// Score a device and write the score and level back onto it.
    pub fn assess(&self, device: &mut DeviceRecord) {
        let score = self.score(&device.manufacturer, &device.open_ports);
        device.risk_score = score;
        device.risk_level = self.level(score);

        tracing::debug!(
            ip = %device.ip,
            score,
            level = %device.risk_level,
            "Risk assessed"
        );
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(RiskRules::default())
    }
}
