//! Post-commit side effects: socket notifications, email queue, partner HTTP API.
//!
//! Handlers only describe effects ([SideEffect]); the dispatcher fires them after the
//! transaction commits. A failed effect is logged and dropped. It never rolls back state.

use crate::error::EffectError;
use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub template: &'static str,
    pub recipient_id: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinListing {
    pub fnft_id: String,
    pub token_address: Address,
    pub chain_id: u64,
    pub total_supply: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeNotice {
    pub offering_id: String,
    pub platform_fee: Decimal,
    pub currency: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Emit {
        namespace: &'static str,
        event: &'static str,
        payload: Value,
    },
    Email(EmailMessage),
    ListCoin(CoinListing),
    NotifyFee(FeeNotice),
}

impl SideEffect {
    pub fn emit(namespace: &'static str, event: &'static str, payload: Value) -> Self {
        SideEffect::Emit {
            namespace,
            event,
            payload,
        }
    }

    pub fn email(template: &'static str, recipient_id: impl Into<String>, params: Value) -> Self {
        SideEffect::Email(EmailMessage {
            template,
            recipient_id: recipient_id.into(),
            params,
        })
    }
}

/// Socket notification fan-out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, namespace: &str, event: &str, payload: &Value) -> Result<(), EffectError>;
}

#[async_trait]
pub trait EmailQueue: Send + Sync {
    async fn enqueue(&self, message: &EmailMessage) -> Result<(), EffectError>;
}

#[async_trait]
pub trait PartnerApi: Send + Sync {
    async fn list_coin(&self, listing: &CoinListing) -> Result<(), EffectError>;
    async fn notify_fee(&self, notice: &FeeNotice) -> Result<(), EffectError>;
}

/// Writes notifications to the log instead of a socket server.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, namespace: &str, event: &str, payload: &Value) -> Result<(), EffectError> {
        tracing::info!(namespace, event, %payload, "notify");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogMailQueue;

#[async_trait]
impl EmailQueue for LogMailQueue {
    async fn enqueue(&self, message: &EmailMessage) -> Result<(), EffectError> {
        tracing::info!(template = message.template, recipient = %message.recipient_id, "email queued");
        Ok(())
    }
}

/// Partner REST API authenticated with a shared `x-api-key` header.
pub struct HttpPartnerApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPartnerApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, EffectError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), EffectError> {
        let resp = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EffectError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PartnerApi for HttpPartnerApi {
    async fn list_coin(&self, listing: &CoinListing) -> Result<(), EffectError> {
        self.post("coins", listing).await
    }

    async fn notify_fee(&self, notice: &FeeNotice) -> Result<(), EffectError> {
        self.post("fees", notice).await
    }
}

/// Used when no partner API is configured.
#[derive(Debug, Default)]
pub struct DisabledPartnerApi;

#[async_trait]
impl PartnerApi for DisabledPartnerApi {
    async fn list_coin(&self, listing: &CoinListing) -> Result<(), EffectError> {
        Err(EffectError::Unavailable(format!("partner API disabled; not listing {}", listing.fnft_id)))
    }

    async fn notify_fee(&self, notice: &FeeNotice) -> Result<(), EffectError> {
        Err(EffectError::Unavailable(format!(
            "partner API disabled; fee for {} not sent",
            notice.offering_id
        )))
    }
}

#[derive(Clone)]
pub struct Effects {
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn EmailQueue>,
    pub partner: Arc<dyn PartnerApi>,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            mailer: Arc::new(LogMailQueue),
            partner: Arc::new(DisabledPartnerApi),
        }
    }
}

impl Effects {
    /// Fire every effect in order. Returns how many failed.
    pub async fn fire(&self, effects: Vec<SideEffect>) -> usize {
        let mut failed = 0;
        for effect in effects {
            let res = match &effect {
                SideEffect::Emit {
                    namespace,
                    event,
                    payload,
                } => self.notifier.emit(namespace, event, payload).await,
                SideEffect::Email(msg) => self.mailer.enqueue(msg).await,
                SideEffect::ListCoin(listing) => self.partner.list_coin(listing).await,
                SideEffect::NotifyFee(notice) => self.partner.notify_fee(notice).await,
            };
            if let Err(e) = res {
                failed += 1;
                tracing::warn!(reason = %e, effect = ?effect, "side effect failed");
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn failures_are_counted_not_propagated() {
        let effects = Effects::default();
        let failed = effects
            .fire(vec![
                SideEffect::emit("iao", "deposit", json!({"id": "iao-1"})),
                SideEffect::NotifyFee(FeeNotice {
                    offering_id: "iao-1".into(),
                    platform_fee: Decimal::ONE,
                    currency: Address::ZERO,
                }),
                SideEffect::email("revenue-approved", "owner", json!({})),
            ])
            .await;
        assert_eq!(failed, 1);
    }

    #[test]
    fn partner_base_url_is_normalized() {
        let api = HttpPartnerApi::new("http://partner.local/api/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url, "http://partner.local/api");
    }
}
