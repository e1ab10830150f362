//! Reconciler configuration, loaded from a JSON file.

use anyhow::{Context, Result};
use gateway::GatewayConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
    #[serde(default)]
    pub partner: PartnerConfig,
    /// USD rate per currency contract (hex address).
    #[serde(default)]
    pub exchange_rates: HashMap<String, Decimal>,
}

/// Handler behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Confirm Deposit / ClaimRevenue receipts on chain before applying.
    pub verify_receipts: bool,
    /// Attempts after an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            verify_receipts: true,
            max_conflict_retries: 3,
        }
    }
}

/// Partner API. Disabled when `base_url` is empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(s).context("parse config")?;
        if let Ok(key) = std::env::var("PARTNER_API_KEY") {
            config.partner.api_key = key;
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&raw)
    }
}
