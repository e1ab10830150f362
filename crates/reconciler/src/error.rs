use gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key {key} in {collection}")]
    DuplicateKey { collection: &'static str, key: String },
    #[error("{key} not found in {collection}")]
    NotFound { collection: &'static str, key: String },
    /// The document changed since the caller read its watermark. Retry.
    #[error("concurrent update of {key} in {collection}")]
    Conflict { collection: &'static str, key: String },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event does not apply to current state (already applied, stale, or out of order).
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("malformed event: {0}")]
    Malformed(String),
    /// Ledger would become inconsistent (negative balance or supply). Operator action needed.
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("exchange rate unavailable: {0}")]
    Rate(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        ReconcileError::Precondition(reason.into())
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        ReconcileError::Invariant(reason.into())
    }

    /// A balance left the representable decimal range.
    pub fn overflow(what: impl std::fmt::Display) -> Self {
        ReconcileError::Invariant(format!("{what} overflows the decimal range"))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::Invariant(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Store(StoreError::Conflict { .. }))
    }
}

/// Failure of a post-commit side effect. Logged, never propagated.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("partner API rejected request: {status}")]
    Rejected { status: u16 },
    #[error("{0}")]
    Unavailable(String),
}
