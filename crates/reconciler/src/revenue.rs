//! Revenue ledger: per (beneficiary, offering, currency) balances.
//!
//! At most one open (not withdrawn) entry exists per triple. Approvals top it up; a confirmed
//! withdrawal closes it for good and the next approval opens a fresh entry with a fresh
//! exchange-rate snapshot.

use crate::error::ReconcileError;
use crate::model::RevenueEntry;
use crate::store::Ledgers;
use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;

/// A currency and its USD rate at the time of approval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyQuote {
    pub contract: Address,
    pub usd_rate: Decimal,
}

pub fn open_entry<'a>(
    ledgers: &'a Ledgers,
    beneficiary_id: &str,
    offering_id: &str,
    currency: Address,
) -> Option<&'a RevenueEntry> {
    ledgers.revenue.find_one(|e| {
        !e.is_withdrawn
            && e.beneficiary_id == beneficiary_id
            && e.offering_id == offering_id
            && e.currency_contract == currency
    })
}

/// Credit `amount` to the open entry for the triple, opening one if needed. Returns the entry id.
pub fn record_approved_revenue(
    ledgers: &mut Ledgers,
    beneficiary_id: &str,
    offering_id: &str,
    amount: Decimal,
    currency: CurrencyQuote,
) -> Result<String, ReconcileError> {
    if amount <= Decimal::ZERO {
        return Err(ReconcileError::invariant(format!(
            "non-positive revenue {amount} for {beneficiary_id} on {offering_id}"
        )));
    }
    if let Some(existing) = open_entry(ledgers, beneficiary_id, offering_id, currency.contract) {
        let id = existing.id.clone();
        let balance = existing
            .balance
            .checked_add(amount)
            .ok_or_else(|| ReconcileError::overflow(format!("revenue entry {id}")))?;
        let updated = ledgers.revenue.update(&id, |e| e.balance = balance)?;
        tracing::debug!(entry = %id, balance = %updated.balance, "revenue entry topped up");
        return Ok(id);
    }
    let generation = ledgers.revenue.aggregate(
        |e| {
            e.beneficiary_id == beneficiary_id
                && e.offering_id == offering_id
                && e.currency_contract == currency.contract
        },
        0usize,
        |n, _| n + 1,
    );
    let id = format!("{beneficiary_id}:{offering_id}:{}:{generation}", currency.contract);
    ledgers.revenue.insert(RevenueEntry {
        id: id.clone(),
        beneficiary_id: beneficiary_id.to_string(),
        offering_id: offering_id.to_string(),
        balance: amount,
        currency_contract: currency.contract,
        exchange_rate_at_approval: currency.usd_rate,
        is_withdrawn: false,
        updated_at: Utc::now(),
    })?;
    tracing::debug!(entry = %id, balance = %amount, rate = %currency.usd_rate, "revenue entry opened");
    Ok(id)
}

/// Close every open entry of the pair (optionally one currency only). Returns the total closed.
pub fn mark_withdrawn(
    ledgers: &mut Ledgers,
    beneficiary_id: &str,
    offering_id: &str,
    currency: Option<Address>,
) -> Result<Decimal, ReconcileError> {
    let matches = |e: &RevenueEntry| {
        !e.is_withdrawn
            && e.beneficiary_id == beneficiary_id
            && e.offering_id == offering_id
            && currency.map_or(true, |c| e.currency_contract == c)
    };
    let total = ledgers
        .revenue
        .aggregate(matches, Some(Decimal::ZERO), |acc, e| acc?.checked_add(e.balance))
        .ok_or_else(|| ReconcileError::overflow(format!("open revenue of {beneficiary_id} on {offering_id}")))?;
    ledgers.revenue.update_many(matches, |e| e.is_withdrawn = true);
    Ok(total)
}
