//! Process-lifetime registry of chain gateways, built once at startup and shared by `Arc`.

use crate::abi::ContractKind;
use crate::chain::ChainFamily;
use crate::config::GatewayConfig;
use crate::contract::ContractHandle;
use crate::error::GatewayError;
use crate::gateway::ChainGateway;
use crate::provider::provision;
use crate::transport::RpcTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

pub struct ChainRegistry {
    config: GatewayConfig,
    transport: Arc<dyn RpcTransport>,
    /// One cell per chain; the map lock is never held while a chain provisions.
    gateways: Mutex<HashMap<u64, Arc<OnceCell<Arc<ChainGateway>>>>>,
}

impl ChainRegistry {
    pub fn new(config: GatewayConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            transport,
            gateways: Mutex::new(HashMap::new()),
        }
    }

    /// Gateway for `chain_id`, provisioning a synced endpoint on first use.
    ///
    /// Concurrent first calls for one chain share a single provisioning; a failed
    /// provisioning leaves the chain unset so the next call tries again.
    pub async fn gateway(&self, chain_id: u64) -> Result<Arc<ChainGateway>, GatewayError> {
        ChainFamily::of(chain_id)?;
        let cell = {
            let mut gateways = self.gateways.lock().await;
            Arc::clone(gateways.entry(chain_id).or_default())
        };
        let gw = cell.get_or_try_init(|| self.connect(chain_id)).await?;
        Ok(Arc::clone(gw))
    }

    async fn connect(&self, chain_id: u64) -> Result<Arc<ChainGateway>, GatewayError> {
        let endpoint = self
            .config
            .endpoint(chain_id)
            .ok_or_else(|| GatewayError::Config(format!("no endpoint configured for chain {chain_id}")))?;
        let provider = provision(
            chain_id,
            &endpoint.urls,
            Arc::clone(&self.transport),
            &self.config.provisioning,
        )
        .await?;
        Ok(Arc::new(ChainGateway::new(
            provider,
            endpoint,
            self.config.retry.clone(),
            self.config.getlogs_max_range,
        )))
    }

    /// Cached contract binding for (chain, kind).
    pub async fn get_contract(&self, chain_id: u64, kind: ContractKind) -> Result<Arc<ContractHandle>, GatewayError> {
        self.gateway(chain_id).await?.get_contract(kind)
    }
}
