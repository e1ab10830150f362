use super::{missing, HandlerResult, Reconciler};
use crate::error::ReconcileError;
use crate::event::{EventContext, StakeChange, TieringPoolCreated};
use crate::model::{OnChainStatus, StakeDirection, StakePosition, StakeReceipt};
use chrono::Utc;
use rust_decimal::Decimal;

impl Reconciler {
    pub async fn stake(&self, ctx: &EventContext, ev: &StakeChange) -> HandlerResult {
        self.apply_stake(ctx, ev, StakeDirection::Stake).await
    }

    pub async fn unstake(&self, ctx: &EventContext, ev: &StakeChange) -> HandlerResult {
        self.apply_stake(ctx, ev, StakeDirection::Unstake).await
    }

    /// Stake or unstake once per transaction hash. A position never goes negative.
    async fn apply_stake(&self, ctx: &EventContext, ev: &StakeChange, direction: StakeDirection) -> HandlerResult {
        let tx_hash = ctx.require_tx_hash()?.to_string();
        if ev.amount <= Decimal::ZERO {
            return Err(ReconcileError::Malformed(format!("{direction:?} {tx_hash}: amount {}", ev.amount)));
        }
        self.store
            .transaction(|l| {
                if l.stake_receipts.get(&tx_hash).is_some() {
                    return Err(ReconcileError::precondition(format!("{direction:?} {tx_hash} already applied")));
                }
                let pool = l.pools.get(&ev.pool_id).ok_or_else(|| missing("tiering pool", &ev.pool_id))?;
                if pool.status != OnChainStatus::OnChain {
                    return Err(ReconcileError::precondition(format!("pool {} not on chain", ev.pool_id)));
                }
                let key = StakePosition::key_for(&ev.pool_id, &ev.account);
                let current = l.stakes.get(&key).map(|p| p.staked).unwrap_or_default();
                let next = match direction {
                    StakeDirection::Stake => current.checked_add(ev.amount),
                    StakeDirection::Unstake => current.checked_sub(ev.amount),
                }
                .ok_or_else(|| ReconcileError::overflow(format!("stake of {} in {}", ev.account, ev.pool_id)))?;
                if next < Decimal::ZERO {
                    return Err(ReconcileError::invariant(format!(
                        "unstake {tx_hash} of {} exceeds {} staked in {}",
                        ev.amount, current, ev.pool_id
                    )));
                }
                if l.stakes.get(&key).is_some() {
                    l.stakes.update(&key, |p| p.staked = next)?;
                } else {
                    l.stakes.insert(StakePosition {
                        pool_id: ev.pool_id.clone(),
                        account: ev.account,
                        staked: next,
                        updated_at: Utc::now(),
                    })?;
                }
                l.stake_receipts.insert(StakeReceipt {
                    tx_hash: tx_hash.clone(),
                    pool_id: ev.pool_id.clone(),
                    account: ev.account,
                    amount: ev.amount,
                    direction,
                    updated_at: Utc::now(),
                })?;
                tracing::info!(pool = %ev.pool_id, account = %ev.account, ?direction, amount = %ev.amount, staked = %next, "stake updated");
                Ok(Vec::new())
            })
            .await
    }

    /// CreateTieringPool: Draft → OnChain.
    pub async fn create_tiering_pool(&self, _ctx: &EventContext, ev: &TieringPoolCreated) -> HandlerResult {
        self.store
            .transaction(|l| {
                let pool = l.pools.get(&ev.pool_id).ok_or_else(|| missing("tiering pool", &ev.pool_id))?;
                if pool.status != OnChainStatus::Draft {
                    return Err(ReconcileError::precondition(format!("pool {} already on chain", ev.pool_id)));
                }
                l.pools.update(&ev.pool_id, |p| {
                    p.status = OnChainStatus::OnChain;
                    if ev.token.is_some() {
                        p.token = ev.token;
                    }
                })?;
                tracing::info!(pool = %ev.pool_id, "tiering pool on chain");
                Ok(Vec::new())
            })
            .await
    }
}
