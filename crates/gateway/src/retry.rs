//! Fixed-delay retry for transient RPC failures.

use crate::config::RetryConfig;
use crate::error::GatewayError;
use std::future::Future;
use tokio::time::{sleep, Duration};

/// Run `op` until it succeeds, fails non-transiently, or attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, op_name: &str, mut op: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(op = op_name, attempt, reason = %e, "transient RPC failure, retrying");
                sleep(Duration::from_millis(policy.delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
