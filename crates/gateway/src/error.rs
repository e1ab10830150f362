//! Gateway error taxonomy.

use thiserror::Error;

/// Transient RPC failure classes. Only these are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    ConnectionRefused,
    Timeout,
    InvalidResponse,
    ReconnectLimit,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransientKind::ConnectionRefused => "connection refused",
            TransientKind::Timeout => "rpc timeout",
            TransientKind::InvalidResponse => "invalid JSON-RPC response",
            TransientKind::ReconnectLimit => "reconnect limit exceeded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unsupported chain id {0}")]
    UnsupportedChain(u64),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no healthy RPC endpoint for chain {chain_id} after {attempts} attempts")]
    NoHealthyEndpoint { chain_id: u64, attempts: u32 },
    #[error("{kind}: {message}")]
    Transient { kind: TransientKind, message: String },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("token does not exist: {0}")]
    TokenNotExist(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("signing error: {0}")]
    Signing(String),
}

impl GatewayError {
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        GatewayError::Transient {
            kind,
            message: message.into(),
        }
    }

    /// True for the fixed set of failure classes that warrant a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }

    /// Map a JSON-RPC `error` object to a typed error.
    ///
    /// Reverts are semantic and never retried; node-side timeouts and
    /// reconnect exhaustion are transient.
    pub fn from_rpc(code: i64, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("nonexistent token")
            || lower.contains("token does not exist")
            || lower.contains("invalid token id")
        {
            return GatewayError::TokenNotExist(message.to_string());
        }
        if lower.contains("execution reverted") || code == 3 {
            let reason = message
                .split_once("execution reverted")
                .map(|(_, r)| r.trim_start_matches(':').trim())
                .filter(|r| !r.is_empty())
                .unwrap_or(message);
            return GatewayError::Reverted(reason.to_string());
        }
        if lower.contains("timeout") || lower.contains("timed out") {
            return GatewayError::transient(TransientKind::Timeout, message);
        }
        if lower.contains("maximum number of reconnect attempts") || lower.contains("reconnect") {
            return GatewayError::transient(TransientKind::ReconnectLimit, message);
        }
        if lower.contains("connection refused") || lower.contains("econnrefused") {
            return GatewayError::transient(TransientKind::ConnectionRefused, message);
        }
        GatewayError::Rpc {
            code,
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::transient(TransientKind::Timeout, err.to_string())
        } else if err.is_connect() {
            GatewayError::transient(TransientKind::ConnectionRefused, err.to_string())
        } else if err.is_decode() {
            GatewayError::transient(TransientKind::InvalidResponse, err.to_string())
        } else {
            GatewayError::Rpc {
                code: -1,
                message: err.to_string(),
            }
        }
    }
}
