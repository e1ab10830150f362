//! Offering lifecycle stage. Pure: identical inputs always give the identical stage.
//!
//! Every window is half-open `[start, end)`, so a boundary instant belongs to the later stage
//! (`now == registration_end` is `OnSaleSoon`).

use crate::model::VaultType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Upcoming,
    RegisterNow,
    OnSaleSoon,
    OnSale,
    Completed,
    Failed,
}

pub fn classify(
    now: DateTime<Utc>,
    registration_start: DateTime<Utc>,
    registration_end: DateTime<Utc>,
    participation_start: DateTime<Utc>,
    participation_end: DateTime<Utc>,
    vault_type: VaultType,
    threshold_met: bool,
) -> Stage {
    if now < registration_start {
        Stage::Upcoming
    } else if now < registration_end {
        Stage::RegisterNow
    } else if now < participation_start {
        Stage::OnSaleSoon
    } else if now < participation_end {
        Stage::OnSale
    } else if vault_type == VaultType::NonVault || threshold_met {
        Stage::Completed
    } else {
        Stage::Failed
    }
}

/// Sold share reaches the unlock threshold (percent of total supply).
pub fn threshold_met(total_supply: Decimal, available_supply: Decimal, threshold_pct: Decimal) -> bool {
    let sold = total_supply - available_supply;
    match (sold.checked_mul(Decimal::ONE_HUNDRED), total_supply.checked_mul(threshold_pct)) {
        (Some(sold_pct), Some(needed)) => sold_pct >= needed,
        // Only reachable with a non-zero supply near the decimal range.
        _ => sold / total_supply * Decimal::ONE_HUNDRED >= threshold_pct,
    }
}
