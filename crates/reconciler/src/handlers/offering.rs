//! IAO event (offering) lifecycle and purchase settlement.

use super::{missing, HandlerResult, Reconciler};
use crate::effects::SideEffect;
use crate::error::ReconcileError;
use crate::event::{EventContext, FundDeposit, OfferingRef};
use crate::model::{advance, AssetStatus, OnChainStatus, Purchase, RecordStatus, WhitelistEntry};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

impl Reconciler {
    /// CreateIAOEvent: an Active draft offering goes on chain; its assets enter the IAO stage.
    pub async fn create_iao_event(&self, _ctx: &EventContext, ev: &OfferingRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let offering = l
                    .offerings
                    .get(&ev.iao_event_id)
                    .ok_or_else(|| missing("offering", &ev.iao_event_id))?;
                if offering.status != RecordStatus::Active || offering.on_chain_status != OnChainStatus::Draft {
                    return Err(ReconcileError::precondition(format!(
                        "offering {} is {:?}/{:?}",
                        ev.iao_event_id, offering.status, offering.on_chain_status
                    )));
                }
                let nft_ids = l
                    .fnfts
                    .get(&offering.fnft_id)
                    .map(|f| f.nft_ids.clone())
                    .unwrap_or_default();
                let asset_ids: Vec<String> = nft_ids
                    .iter()
                    .filter_map(|id| l.nfts.get(id).map(|n| n.asset_id.clone()))
                    .collect();
                l.offerings
                    .update(&ev.iao_event_id, |o| o.on_chain_status = OnChainStatus::OnChain)?;
                l.assets.update_many(
                    |a| asset_ids.contains(&a.id),
                    |a| {
                        advance(&mut a.status, AssetStatus::IaoEvent);
                    },
                );
                tracing::info!(offering = %ev.iao_event_id, assets = asset_ids.len(), "offering on chain");
                Ok(vec![SideEffect::emit(
                    "iao-event",
                    "created",
                    json!({ "id": ev.iao_event_id }),
                )])
            })
            .await
    }

    /// DeactivateIAOEvent: Active → Inactive. Deactivating an inactive offering is a no-op.
    pub async fn deactivate_iao_event(&self, _ctx: &EventContext, ev: &OfferingRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let offering = l
                    .offerings
                    .get(&ev.iao_event_id)
                    .ok_or_else(|| missing("offering", &ev.iao_event_id))?;
                if offering.status != RecordStatus::Active {
                    return Err(ReconcileError::precondition(format!(
                        "offering {} already inactive",
                        ev.iao_event_id
                    )));
                }
                l.offerings
                    .update(&ev.iao_event_id, |o| o.status = RecordStatus::Inactive)?;
                tracing::info!(offering = %ev.iao_event_id, "offering deactivated");
                Ok(vec![SideEffect::emit(
                    "iao-event",
                    "deactivated",
                    json!({ "id": ev.iao_event_id }),
                )])
            })
            .await
    }

    /// Deposit: settle one purchase, keyed by its transaction hash.
    ///
    /// Offering and fractional-token available supply both drop by the purchased amount;
    /// either going negative aborts the whole settlement.
    pub async fn deposit(&self, ctx: &EventContext, ev: &FundDeposit) -> HandlerResult {
        let tx_hash = ctx.require_tx_hash()?.to_string();
        if ev.amount <= Decimal::ZERO || ev.value < Decimal::ZERO {
            return Err(ReconcileError::Malformed(format!(
                "deposit {tx_hash}: amount {} value {}",
                ev.amount, ev.value
            )));
        }
        if self.store.read(|l| l.purchases.get(&tx_hash).is_some()).await {
            return Err(ReconcileError::precondition(format!("purchase {tx_hash} already settled")));
        }
        self.confirm_receipt(ctx).await?;

        self.store
            .transaction(|l| {
                if l.purchases.get(&tx_hash).is_some() {
                    return Err(ReconcileError::precondition(format!("purchase {tx_hash} already settled")));
                }
                let offering = l
                    .offerings
                    .get(&ev.iao_event_id)
                    .ok_or_else(|| missing("offering", &ev.iao_event_id))?;
                if offering.on_chain_status != OnChainStatus::OnChain {
                    return Err(ReconcileError::precondition(format!(
                        "offering {} is not on chain",
                        ev.iao_event_id
                    )));
                }
                let fnft_id = offering.fnft_id.clone();
                let remaining = offering.available_supply - ev.amount;
                if remaining < Decimal::ZERO {
                    return Err(ReconcileError::invariant(format!(
                        "deposit {tx_hash} of {} exceeds offering {} available {}",
                        ev.amount, ev.iao_event_id, offering.available_supply
                    )));
                }
                let fnft = l.fnfts.get(&fnft_id).ok_or_else(|| missing("fnft", &fnft_id))?;
                if fnft.available_supply - ev.amount < Decimal::ZERO {
                    return Err(ReconcileError::invariant(format!(
                        "deposit {tx_hash} of {} exceeds fnft {fnft_id} available {}",
                        ev.amount, fnft.available_supply
                    )));
                }

                let sold_value = offering
                    .sold_value
                    .checked_add(ev.value)
                    .ok_or_else(|| ReconcileError::overflow(format!("sold value of {}", ev.iao_event_id)))?;
                let key = WhitelistEntry::key_for(&ev.iao_event_id, &ev.buyer);
                let (purchased, deposited) = match l.whitelist.get(&key) {
                    Some(w) => (
                        w.purchased_amount.checked_add(ev.amount),
                        w.deposited_value.checked_add(ev.value),
                    ),
                    None => (Some(ev.amount), Some(ev.value)),
                };
                let (Some(purchased), Some(deposited)) = (purchased, deposited) else {
                    return Err(ReconcileError::overflow(format!("whitelist entry {key}")));
                };

                l.purchases.insert(Purchase {
                    tx_hash: tx_hash.clone(),
                    offering_id: ev.iao_event_id.clone(),
                    buyer: ev.buyer,
                    amount: ev.amount,
                    value: ev.value,
                    updated_at: Utc::now(),
                })?;
                l.offerings.update(&ev.iao_event_id, |o| {
                    o.available_supply = remaining;
                    o.sold_value = sold_value;
                })?;
                l.fnfts.update(&fnft_id, |f| f.available_supply -= ev.amount)?;
                if l.whitelist.get(&key).is_some() {
                    l.whitelist.update(&key, |w| {
                        w.purchased_amount = purchased;
                        w.deposited_value = deposited;
                    })?;
                } else {
                    l.whitelist.insert(WhitelistEntry {
                        offering_id: ev.iao_event_id.clone(),
                        wallet: ev.buyer,
                        purchased_amount: ev.amount,
                        deposited_value: ev.value,
                        updated_at: Utc::now(),
                    })?;
                }
                tracing::info!(
                    offering = %ev.iao_event_id,
                    tx = %tx_hash,
                    buyer = %ev.buyer,
                    amount = %ev.amount,
                    available = %remaining,
                    "deposit settled"
                );
                Ok(vec![SideEffect::emit(
                    "iao-event",
                    "deposit",
                    json!({ "id": ev.iao_event_id, "availableSupply": remaining, "buyer": ev.buyer }),
                )])
            })
            .await
    }
}
