//! Endpoint selection: pick a random URL, probe sync status, rotate until a synced node answers.

use crate::config::ProvisioningConfig;
use crate::error::GatewayError;
use crate::transport::RpcTransport;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// A live, synced endpoint for one chain.
#[derive(Clone)]
pub struct Provider {
    chain_id: u64,
    url: String,
    transport: Arc<dyn RpcTransport>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("chain_id", &self.chain_id)
            .field("url", &self.url)
            .finish()
    }
}

impl Provider {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.transport.request(&self.url, method, params).await
    }
}

/// `eth_syncing` returns `false` when synced, a progress object otherwise.
pub async fn is_syncing(transport: &dyn RpcTransport, url: &str) -> Result<bool, GatewayError> {
    let result = transport.request(url, "eth_syncing", json!([])).await?;
    Ok(match result {
        Value::Bool(b) => b,
        Value::Null => false,
        _ => true,
    })
}

/// Select a synced endpoint, bounded by `config.max_attempts` probes.
///
/// The first URL is chosen at random; each failed probe rotates to the next one.
pub async fn provision(
    chain_id: u64,
    urls: &[String],
    transport: Arc<dyn RpcTransport>,
    config: &ProvisioningConfig,
) -> Result<Provider, GatewayError> {
    if urls.is_empty() {
        return Err(GatewayError::Config(format!("no RPC urls configured for chain {chain_id}")));
    }
    let max_attempts = config.max_attempts.max(1);
    let mut index = rand::thread_rng().gen_range(0..urls.len());
    for attempt in 1..=max_attempts {
        let url = &urls[index];
        match is_syncing(transport.as_ref(), url).await {
            Ok(false) => {
                tracing::info!(chain_id, url = %url, attempt, "RPC endpoint selected");
                return Ok(Provider {
                    chain_id,
                    url: url.clone(),
                    transport,
                });
            }
            Ok(true) => {
                tracing::warn!(chain_id, url = %url, attempt, "RPC endpoint still syncing, rotating");
            }
            Err(e) => {
                tracing::warn!(chain_id, url = %url, attempt, reason = %e, "RPC endpoint probe failed, rotating");
            }
        }
        index = (index + 1) % urls.len();
        if attempt < max_attempts {
            sleep(Duration::from_millis(config.cooldown_ms)).await;
        }
    }
    Err(GatewayError::NoHealthyEndpoint {
        chain_id,
        attempts: max_attempts,
    })
}
