//! Revenue approval, rejection and beneficiary claims.

use super::{missing, HandlerResult, Reconciler};
use crate::effects::{FeeNotice, SideEffect};
use crate::error::ReconcileError;
use crate::event::{EventContext, OfferingRef, RevenueApproval, RevenueClaim};
use crate::model::{RevenueStatus, WithdrawalItem, WithdrawalRequest, WithdrawalStatus};
use crate::store::Ledgers;
use crate::revenue::{mark_withdrawn, record_approved_revenue, CurrencyQuote};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

/// How one approved amount is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RevenueSplit {
    pub platform: Decimal,
    pub bd: Decimal,
    pub owner: Decimal,
}

/// Split `amount` by percentage rates. Without a BD partner the BD share stays with the platform.
pub(crate) fn split_revenue(
    amount: Decimal,
    platform_rate: Decimal,
    bd_rate: Decimal,
    has_bd: bool,
) -> Result<RevenueSplit, ReconcileError> {
    let share = |rate: Decimal| {
        amount
            .checked_mul(rate)
            .map(|v| v / Decimal::ONE_HUNDRED)
            .ok_or_else(|| ReconcileError::overflow(format!("{rate}% of revenue {amount}")))
    };
    let mut platform = share(platform_rate)?;
    let mut bd = share(bd_rate)?;
    if !has_bd {
        platform = platform
            .checked_add(bd)
            .ok_or_else(|| ReconcileError::overflow(format!("platform share of revenue {amount}")))?;
        bd = Decimal::ZERO;
    }
    let owner = amount
        .checked_sub(platform)
        .and_then(|v| v.checked_sub(bd))
        .ok_or_else(|| ReconcileError::overflow(format!("owner share of revenue {amount}")))?;
    if platform < Decimal::ZERO || bd < Decimal::ZERO || owner < Decimal::ZERO {
        return Err(ReconcileError::invariant(format!(
            "revenue split of {amount} at {platform_rate}%/{bd_rate}% gives owner {owner}"
        )));
    }
    Ok(RevenueSplit { platform, bd, owner })
}

impl Reconciler {
    /// ApproveIAORevenue: split the approved amount and credit the ledger.
    ///
    /// Reads the offering watermark, fetches the exchange rate, then writes only if the
    /// offering is unchanged. A concurrent write surfaces as a retryable conflict.
    pub async fn approve_revenue(&self, ctx: &EventContext, ev: &RevenueApproval) -> HandlerResult {
        let tx_hash = ctx.require_tx_hash()?.to_string();
        if ev.amount <= Decimal::ZERO {
            return Err(ReconcileError::Malformed(format!("approval {tx_hash}: amount {}", ev.amount)));
        }
        let offering = self
            .store
            .read(|l| l.offerings.get(&ev.iao_event_id).cloned())
            .await
            .ok_or_else(|| missing("offering", &ev.iao_event_id))?;
        let revenue = &offering.revenue;
        if revenue.status == RevenueStatus::Rejected {
            return Err(ReconcileError::precondition(format!("revenue of {} was rejected", offering.id)));
        }
        if revenue.approved_transactions.contains(&tx_hash) {
            return Err(ReconcileError::precondition(format!("approval {tx_hash} already applied")));
        }
        let split = split_revenue(
            ev.amount,
            revenue.platform_commission_rate,
            revenue.bd_commission_rate,
            offering.bd_id.is_some(),
        )?;
        let usd_rate = self.rates.usd_rate(ctx.chain_id, offering.currency_contract).await?;
        let quote = CurrencyQuote {
            contract: offering.currency_contract,
            usd_rate,
        };
        let platform_commission = revenue
            .platform_commission
            .checked_add(split.platform)
            .ok_or_else(|| ReconcileError::overflow(format!("platform commission of {}", offering.id)))?;
        let watermark = offering.updated_at;
        let now = Utc::now();

        self.store
            .transaction(|l| {
                l.offerings.update_if_unchanged(&offering.id, watermark, |o| {
                    o.revenue.status = RevenueStatus::Approved;
                    o.revenue.approved_transactions.push(tx_hash.clone());
                    o.revenue.platform_commission = platform_commission;
                    if o.revenue.finalized_by.is_none() {
                        o.revenue.finalized_by = Some(ev.sender);
                        o.revenue.finalized_on = Some(now);
                    }
                })?;
                if split.owner > Decimal::ZERO {
                    record_approved_revenue(l, &offering.beneficiary_id, &offering.id, split.owner, quote)?;
                }
                if let Some(bd_id) = offering.bd_id.as_deref() {
                    if split.bd > Decimal::ZERO {
                        record_approved_revenue(l, bd_id, &offering.id, split.bd, quote)?;
                    }
                }
                tracing::info!(
                    offering = %offering.id,
                    tx = %tx_hash,
                    amount = %ev.amount,
                    owner = %split.owner,
                    platform = %split.platform,
                    bd = %split.bd,
                    rate = %usd_rate,
                    "revenue approved"
                );
                Ok(vec![
                    SideEffect::email(
                        "revenue-approved",
                        offering.beneficiary_id.clone(),
                        json!({ "offeringId": offering.id, "amount": split.owner, "currency": quote.contract }),
                    ),
                    SideEffect::NotifyFee(FeeNotice {
                        offering_id: offering.id.clone(),
                        platform_fee: split.platform,
                        currency: quote.contract,
                    }),
                ])
            })
            .await
    }

    /// RejectIAORevenue: Pending → Rejected.
    pub async fn reject_revenue(&self, _ctx: &EventContext, ev: &OfferingRef) -> HandlerResult {
        self.store
            .transaction(|l| {
                let offering = l
                    .offerings
                    .get(&ev.iao_event_id)
                    .ok_or_else(|| missing("offering", &ev.iao_event_id))?;
                if offering.revenue.status != RevenueStatus::Pending {
                    return Err(ReconcileError::precondition(format!(
                        "revenue of {} is {:?}, not Pending",
                        ev.iao_event_id, offering.revenue.status
                    )));
                }
                let beneficiary = offering.beneficiary_id.clone();
                l.offerings.update(&ev.iao_event_id, |o| {
                    o.revenue.status = RevenueStatus::Rejected;
                    o.revenue.finalized_by = ev.sender;
                    o.revenue.finalized_on = Some(Utc::now());
                })?;
                tracing::info!(offering = %ev.iao_event_id, "revenue rejected");
                Ok(vec![SideEffect::email(
                    "revenue-rejected",
                    beneficiary,
                    json!({ "offeringId": ev.iao_event_id }),
                )])
            })
            .await
    }

    /// ClaimRevenue: the beneficiary withdrew one currency of a request on chain.
    ///
    /// Closes every open ledger entry the request item covers. The closed total must equal
    /// the requested amount, otherwise the claim is aborted for operator review.
    pub async fn claim_revenue(&self, ctx: &EventContext, ev: &RevenueClaim) -> HandlerResult {
        let tx_hash = ctx.require_tx_hash()?.to_string();
        self.store.read(|l| claimable(l, ev).map(|_| ())).await?;
        self.confirm_receipt(ctx).await?;

        self.store
            .transaction(|l| {
                let (request, item) = claimable(l, ev)?;
                let beneficiary = request.beneficiary_id.clone();
                let offering_ids = item.offering_ids.clone();
                let requested = item.amount;

                let mut withdrawn = Decimal::ZERO;
                for offering_id in &offering_ids {
                    let closed = mark_withdrawn(l, &beneficiary, offering_id, Some(ev.currency_contract))?;
                    withdrawn = withdrawn
                        .checked_add(closed)
                        .ok_or_else(|| ReconcileError::overflow(format!("withdrawal {} total", ev.request_id)))?;
                }
                if withdrawn != requested {
                    return Err(ReconcileError::invariant(format!(
                        "withdrawal {} {}: ledger holds {withdrawn}, request asks {requested}",
                        ev.request_id, ev.currency_contract
                    )));
                }
                let updated = l.withdrawals.update(&ev.request_id, |r| {
                    for item in r.revenue.iter_mut().filter(|i| i.contract_address == ev.currency_contract) {
                        item.tx_hash = Some(tx_hash.clone());
                    }
                    r.status = if r.revenue.iter().all(|i| i.tx_hash.is_some()) {
                        WithdrawalStatus::Successful
                    } else {
                        WithdrawalStatus::Processing
                    };
                })?;
                tracing::info!(
                    request = %ev.request_id,
                    currency = %ev.currency_contract,
                    amount = %withdrawn,
                    status = ?updated.status,
                    "revenue claimed"
                );
                if updated.status != WithdrawalStatus::Successful {
                    return Ok(Vec::new());
                }
                Ok(vec![
                    SideEffect::email(
                        "withdrawal-successful",
                        beneficiary.clone(),
                        json!({ "requestId": ev.request_id }),
                    ),
                    SideEffect::emit(
                        "withdrawal",
                        "successful",
                        json!({ "id": ev.request_id, "beneficiaryId": beneficiary }),
                    ),
                ])
            })
            .await
    }
}

/// The open request and its item for the claimed currency, or why the claim does not apply.
fn claimable<'a>(
    l: &'a Ledgers,
    ev: &RevenueClaim,
) -> Result<(&'a WithdrawalRequest, &'a WithdrawalItem), ReconcileError> {
    let request = l
        .withdrawals
        .get(&ev.request_id)
        .ok_or_else(|| missing("withdrawal request", &ev.request_id))?;
    if !matches!(request.status, WithdrawalStatus::Requesting | WithdrawalStatus::Processing) {
        return Err(ReconcileError::precondition(format!(
            "withdrawal {} is {:?}",
            ev.request_id, request.status
        )));
    }
    let item = request
        .revenue
        .iter()
        .find(|i| i.contract_address == ev.currency_contract)
        .ok_or_else(|| missing("withdrawal item", &ev.currency_contract.to_string()))?;
    if let Some(done) = &item.tx_hash {
        return Err(ReconcileError::precondition(format!(
            "withdrawal {} {} already claimed in {done}",
            ev.request_id, ev.currency_contract
        )));
    }
    Ok((request, item))
}
