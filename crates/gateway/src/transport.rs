//! JSON-RPC transport seam.

use crate::error::{GatewayError, TransientKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sends one JSON-RPC request to one endpoint URL and returns its `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value, GatewayError>;
}

/// HTTP JSON-RPC over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self {
            client,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let resp = self.client.post(url).json(&body).send().await?;
        let text = resp.text().await?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::transient(TransientKind::InvalidResponse, e.to_string()))?;
        extract_result(json)
    }
}

/// Split a JSON-RPC response envelope into result or typed error.
pub fn extract_result(mut envelope: Value) -> Result<Value, GatewayError> {
    if let Some(err) = envelope.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(GatewayError::from_rpc(code, &message));
    }
    envelope
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| GatewayError::transient(TransientKind::InvalidResponse, "missing result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_result() {
        let v = extract_result(json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"})).unwrap();
        assert_eq!(v, json!("0x10"));
    }

    #[test]
    fn envelope_without_result_is_transient() {
        let e = extract_result(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert!(e.is_transient());
    }

    #[test]
    fn envelope_error_is_classified() {
        let e = extract_result(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3, "message": "execution reverted: ERC721: invalid token ID"}
        }))
        .unwrap_err();
        assert!(matches!(e, GatewayError::TokenNotExist(_)));
    }
}
