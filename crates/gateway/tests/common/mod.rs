//! Common helpers for integration tests: an in-process scripted JSON-RPC transport.
#![allow(dead_code)]

use async_trait::async_trait;
use gateway::{ChainEndpoint, GatewayConfig, GatewayError, ProvisioningConfig, RetryConfig, RpcTransport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&str, &str, &Value) -> Result<Value, GatewayError> + Send + Sync>;

/// Answers requests with a closure `(url, method, params)` and records every call.
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&str, &str, &Value) -> Result<Value, GatewayError> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls_to(&self, url: &str, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, m)| u == url && m == method)
            .count()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, m)| m == method).count()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.calls.lock().unwrap().push((url.to_string(), method.to_string()));
        (self.handler)(url, method, &params)
    }
}

/// Config for one chain with zero delays so tests run instantly.
pub fn config(chain_id: u64, urls: &[&str], contracts: &[(gateway::ContractKind, &str)]) -> GatewayConfig {
    GatewayConfig {
        endpoints: vec![ChainEndpoint {
            chain_id,
            urls: urls.iter().map(|u| u.to_string()).collect(),
            contracts: contracts
                .iter()
                .map(|(k, a)| (*k, a.parse().expect("address")))
                .collect::<HashMap<_, _>>(),
        }],
        retry: RetryConfig {
            max_attempts: 3,
            delay_ms: 0,
        },
        provisioning: ProvisioningConfig {
            max_attempts: 4,
            cooldown_ms: 0,
        },
        getlogs_max_range: 10,
    }
}

/// ABI word for a uint256 return value.
pub fn word(n: u64) -> Value {
    Value::String(format!("0x{:064x}", n))
}

pub fn log_json(address: &str, block: u64, index: u64) -> Value {
    serde_json::json!({
        "address": address,
        "topics": [format!("0x{:064x}", 0xabcdu64)],
        "data": "0x",
        "blockNumber": format!("0x{:x}", block),
        "transactionHash": format!("0x{:064x}", block * 100 + index),
        "logIndex": format!("0x{:x}", index),
    })
}
