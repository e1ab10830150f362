//! Typed read calls against one deployed contract.

use crate::abi::ContractKind;
use crate::config::RetryConfig;
use crate::error::GatewayError;
use crate::provider::Provider;
use crate::retry::with_retry;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use serde_json::json;

/// A contract binding: (chain, kind, address) over the chain's live provider.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    kind: ContractKind,
    address: Address,
    provider: Provider,
    retry: RetryConfig,
}

impl ContractHandle {
    pub(crate) fn new(kind: ContractKind, address: Address, provider: Provider, retry: RetryConfig) -> Self {
        Self {
            kind,
            address,
            provider,
            retry,
        }
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    /// ABI-encode `call`, run it through `eth_call` at latest, decode the return.
    pub async fn call<C: SolCall>(&self, call: &C) -> Result<C::Return, GatewayError> {
        let calldata = call.abi_encode();
        let raw = with_retry(&self.retry, C::SIGNATURE, || self.eth_call(&calldata)).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| GatewayError::Decode(format!("{}: {e}", C::SIGNATURE)))
    }

    async fn eth_call(&self, calldata: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let params = json!([{
            "to": format!("0x{}", hex::encode(self.address)),
            "data": format!("0x{}", hex::encode(calldata)),
        }, "latest"]);
        let result = self.provider.request("eth_call", params).await?;
        let s = result
            .as_str()
            .ok_or_else(|| GatewayError::Decode("eth_call result not string".into()))?;
        crate::abi::parse_hex_bytes(s)
    }
}
