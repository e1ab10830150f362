//! Event dispatcher: normalize, route, apply, then fire side effects.
//!
//! `dispatch` never fails. Every outcome, including handler panics, comes back as a
//! [DispatchReport] so one bad event cannot stop a batch.

use crate::effects::Effects;
use crate::error::ReconcileError;
use crate::event::{normalize, EventPayload, InboundEvent, NormalizedEvent};
use crate::handlers::{HandlerResult, Reconciler};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// Committed. `failed_effects` of `effects` post-commit effects failed.
    Applied { effects: usize, failed_effects: usize },
    /// Precondition not met (duplicate, stale or out of order). Nothing written.
    Skipped(String),
    /// No handler for this event name.
    Ignored,
    /// Nothing written. `fatal` marks a ledger invariant violation.
    Failed { reason: String, fatal: bool },
}

impl DispatchReport {
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchReport::Applied { .. })
    }
}

pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    effects: Effects,
    max_conflict_retries: u32,
}

impl Dispatcher {
    pub fn new(reconciler: Arc<Reconciler>, effects: Effects) -> Self {
        let max_conflict_retries = reconciler.settings().max_conflict_retries;
        Self {
            reconciler,
            effects,
            max_conflict_retries,
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub async fn dispatch(&self, raw: InboundEvent) -> DispatchReport {
        let span = tracing::info_span!(
            "dispatch",
            record = %raw.record_id,
            event = %raw.event_name,
            chain_id = raw.chain_id
        );
        self.dispatch_inner(raw).instrument(span).await
    }

    /// Dispatch in delivery order.
    pub async fn dispatch_all(&self, events: impl IntoIterator<Item = InboundEvent>) -> Vec<DispatchReport> {
        let mut reports = Vec::new();
        for event in events {
            reports.push(self.dispatch(event).await);
        }
        reports
    }

    async fn dispatch_inner(&self, raw: InboundEvent) -> DispatchReport {
        let event = match normalize(&raw) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!("no handler, ignoring");
                return DispatchReport::Ignored;
            }
            Err(e) => return failed(e),
        };

        let outcome = AssertUnwindSafe(self.apply_with_retry(&event)).catch_unwind().await;
        match outcome {
            Ok(Ok(effects)) => {
                let total = effects.len();
                let failed_effects = self.effects.fire(effects).await;
                DispatchReport::Applied {
                    effects: total,
                    failed_effects,
                }
            }
            Ok(Err(ReconcileError::Precondition(reason))) => {
                tracing::warn!(%reason, "precondition not met, skipping");
                DispatchReport::Skipped(reason)
            }
            Ok(Err(e)) => failed(e),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%reason, "handler panicked");
                DispatchReport::Failed {
                    reason: format!("handler panicked: {reason}"),
                    fatal: false,
                }
            }
        }
    }

    async fn apply_with_retry(&self, event: &NormalizedEvent) -> HandlerResult {
        let mut attempt = 0;
        loop {
            match self.route(event).await {
                Err(e) if e.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, reason = %e, "conflict, re-reading");
                }
                other => return other,
            }
        }
    }

    async fn route(&self, event: &NormalizedEvent) -> HandlerResult {
        let r = &self.reconciler;
        let ctx = &event.context;
        match &event.payload {
            EventPayload::SetAdmin(p) => r.set_admin(ctx, p).await,
            EventPayload::MintNft(p) => r.mint_nft(ctx, p).await,
            EventPayload::MintFnft(p) => r.mint_fnft(ctx, p).await,
            EventPayload::CreateIaoEvent(p) => r.create_iao_event(ctx, p).await,
            EventPayload::DeactivateFnft(p) => r.deactivate_fnft(ctx, p).await,
            EventPayload::DeactivateIaoEvent(p) => r.deactivate_iao_event(ctx, p).await,
            EventPayload::DepositNft(p) => r.deposit_nft(ctx, p).await,
            EventPayload::Deposit(p) => r.deposit(ctx, p).await,
            EventPayload::MergeFnft(p) => r.merge_fnft(ctx, p).await,
            EventPayload::ApproveIaoRevenue(p) => r.approve_revenue(ctx, p).await,
            EventPayload::RejectIaoRevenue(p) => r.reject_revenue(ctx, p).await,
            EventPayload::ClaimRevenue(p) => r.claim_revenue(ctx, p).await,
            EventPayload::RedeemNft(p) => r.redeem_nft(ctx, p).await,
            EventPayload::Stake(p) => r.stake(ctx, p).await,
            EventPayload::Unstake(p) => r.unstake(ctx, p).await,
            EventPayload::CreateTieringPool(p) => r.create_tiering_pool(ctx, p).await,
        }
    }
}

fn failed(e: ReconcileError) -> DispatchReport {
    let fatal = e.is_fatal();
    if fatal {
        tracing::error!(reason = %e, "ledger invariant violated, event rejected");
    } else {
        tracing::warn!(reason = %e, "event failed");
    }
    DispatchReport::Failed {
        reason: e.to_string(),
        fatal,
    }
}
