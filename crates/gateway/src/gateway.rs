//! ChainGateway: one live provider per chain with cached contract bindings.

use crate::abi::{decode_log, decode_receipt, decode_transaction, parse_hex_u64, ContractKind, RawLog, ReceiptInfo, TransactionInfo};
use crate::config::{ChainEndpoint, RetryConfig};
use crate::contract::ContractHandle;
use crate::error::GatewayError;
use crate::provider::Provider;
use crate::retry::with_retry;
use crate::signer::{self, SignField};
use alloy::primitives::{Address, B256};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct ChainGateway {
    provider: Provider,
    contracts: HashMap<ContractKind, Address>,
    retry: RetryConfig,
    getlogs_max_range: u64,
    bindings: RwLock<HashMap<ContractKind, Arc<ContractHandle>>>,
}

impl ChainGateway {
    pub(crate) fn new(provider: Provider, endpoint: &ChainEndpoint, retry: RetryConfig, getlogs_max_range: u64) -> Self {
        Self {
            provider,
            contracts: endpoint.contracts.clone(),
            retry,
            getlogs_max_range: getlogs_max_range.max(1),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    /// URL of the endpoint selected at provisioning.
    pub fn url(&self) -> &str {
        self.provider.url()
    }

    /// Cached binding for the configured contract of `kind`.
    pub fn get_contract(&self, kind: ContractKind) -> Result<Arc<ContractHandle>, GatewayError> {
        if let Some(handle) = self.bindings.read().ok().and_then(|b| b.get(&kind).cloned()) {
            return Ok(handle);
        }
        let address = *self.contracts.get(&kind).ok_or_else(|| {
            GatewayError::Config(format!("no {kind} contract configured for chain {}", self.chain_id()))
        })?;
        let mut bindings = self
            .bindings
            .write()
            .map_err(|_| GatewayError::Config("contract cache poisoned".into()))?;
        let handle = bindings
            .entry(kind)
            .or_insert_with(|| Arc::new(ContractHandle::new(kind, address, self.provider.clone(), self.retry.clone())))
            .clone();
        Ok(handle)
    }

    /// Uncached binding for a per-token contract (e.g. one fractional token).
    pub fn contract_at(&self, kind: ContractKind, address: Address) -> ContractHandle {
        ContractHandle::new(kind, address, self.provider.clone(), self.retry.clone())
    }

    async fn request(&self, method: &'static str, params: Value) -> Result<Value, GatewayError> {
        with_retry(&self.retry, method, || self.provider.request(method, params.clone())).await
    }

    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let s = result
            .as_str()
            .ok_or_else(|| GatewayError::Decode("blockNumber not string".into()))?;
        parse_hex_u64(s)
    }

    /// None when the node does not know the hash.
    pub async fn get_transaction(&self, hash: B256) -> Result<Option<TransactionInfo>, GatewayError> {
        let result = self.request("eth_getTransactionByHash", json!([format!("0x{}", hex::encode(hash))])).await?;
        if result.is_null() {
            return Ok(None);
        }
        decode_transaction(&result).map(Some)
    }

    /// None while the transaction is pending or unknown.
    pub async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>, GatewayError> {
        let result = self.request("eth_getTransactionReceipt", json!([format!("0x{}", hex::encode(hash))])).await?;
        if result.is_null() {
            return Ok(None);
        }
        decode_receipt(&result).map(Some)
    }

    /// All logs emitted by the configured `kind` contract in `[from_block, to_block]`,
    /// fetched in chunks of at most `getlogs_max_range` blocks and ordered by (block, log index).
    pub async fn get_past_events(&self, kind: ContractKind, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, GatewayError> {
        let contract = self.get_contract(kind)?;
        let address = format!("0x{}", hex::encode(contract.address()));
        let mut out = Vec::new();
        let mut from = from_block;
        while from <= to_block {
            let to = from.saturating_add(self.getlogs_max_range - 1).min(to_block);
            let filter = json!({
                "address": address,
                "fromBlock": format!("0x{:x}", from),
                "toBlock": format!("0x{:x}", to),
            });
            let result = self.request("eth_getLogs", json!([filter])).await?;
            let logs = result
                .as_array()
                .ok_or_else(|| GatewayError::Decode("getLogs not array".into()))?;
            for log in logs {
                out.push(decode_log(log)?);
            }
            tracing::debug!(chain_id = self.chain_id(), %kind, from, to, count = logs.len(), "fetched past events");
            if to == u64::MAX {
                break;
            }
            from = to + 1;
        }
        out.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(out)
    }

    pub fn sign(&self, fields: &[SignField], key: &[u8]) -> Result<Vec<u8>, GatewayError> {
        signer::sign(fields, key)
    }
}
