//! Gateway configuration.

use crate::abi::ContractKind;
use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;

/// RPC endpoints for one chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainEndpoint {
    pub chain_id: u64,
    pub urls: Vec<String>,
    /// Deployed contract addresses by kind.
    #[serde(default)]
    pub contracts: HashMap<ContractKind, Address>,
}

/// Gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    pub endpoints: Vec<ChainEndpoint>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Max block range per eth_getLogs request.
    #[serde(default = "default_getlogs_max_range")]
    pub getlogs_max_range: u64,
}

fn default_getlogs_max_range() -> u64 {
    5_000
}

impl GatewayConfig {
    pub fn endpoint(&self, chain_id: u64) -> Option<&ChainEndpoint> {
        self.endpoints.iter().find(|e| e.chain_id == chain_id)
    }
}

/// Fixed-delay retry for public operations.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1_000,
        }
    }
}

/// Bounds for the "still syncing" endpoint rotation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    pub max_attempts: u32,
    pub cooldown_ms: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            cooldown_ms: 500,
        }
    }
}
