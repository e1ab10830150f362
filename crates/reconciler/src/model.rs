//! Off-chain ledger documents and their status pipelines.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Move `current` forward to `next`; returns false (and leaves it) if `next` is not ahead.
pub fn advance<T: Ord + Copy>(current: &mut T, next: T) -> bool {
    if next > *current {
        *current = next;
        true
    } else {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnChainStatus {
    Draft,
    OnChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultType {
    Vault,
    NonVault,
}

/// Asset pipeline. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetStatus {
    Open,
    IaoApproved,
    ConvertedToNft,
    Fractionalized,
    IaoEvent,
    Redeemed,
}

/// Custody sub-status. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustodyStatus {
    Fractor,
    InReview,
    Frac,
    AvailableForRedeem,
    Redeemed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NftStatus {
    Draft,
    Minted,
    Fractionalized,
    Redeemed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FnftStatus {
    Draft,
    Active,
    Inactive,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Requesting,
    Processing,
    Successful,
    Canceled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminRole {
    SuperAdmin,
    OperationAdmin,
    HeadOfBd,
    FractorBd,
    MasterBd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub owner_id: String,
    pub status: AssetStatus,
    pub custody: CustodyStatus,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    pub token_id: String,
    pub asset_id: String,
    pub status: NftStatus,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub fnft_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fnft {
    pub id: String,
    #[serde(default)]
    pub token_address: Option<Address>,
    pub nft_ids: Vec<String>,
    pub status: FnftStatus,
    #[serde(default)]
    pub total_supply: Decimal,
    #[serde(default)]
    pub available_supply: Decimal,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingRevenue {
    pub status: RevenueStatus,
    /// Percent of each approved amount kept by the platform.
    pub platform_commission_rate: Decimal,
    /// Percent credited to the business-development partner, if any.
    pub bd_commission_rate: Decimal,
    #[serde(default)]
    pub finalized_by: Option<Address>,
    #[serde(default)]
    pub finalized_on: Option<DateTime<Utc>>,
    /// Approval transactions already applied (idempotency keys).
    #[serde(default)]
    pub approved_transactions: Vec<String>,
    #[serde(default)]
    pub platform_commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub id: String,
    pub fnft_id: String,
    pub beneficiary_id: String,
    #[serde(default)]
    pub bd_id: Option<String>,
    pub currency_contract: Address,
    pub status: RecordStatus,
    pub on_chain_status: OnChainStatus,
    pub total_supply: Decimal,
    pub available_supply: Decimal,
    #[serde(default)]
    pub sold_value: Decimal,
    pub vault_type: VaultType,
    /// Percent of total supply that must sell for a Vault offering to succeed.
    pub vault_unlock_threshold: Decimal,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub participation_start: DateTime<Utc>,
    pub participation_end: DateTime<Utc>,
    pub revenue: OfferingRevenue,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Offering {
    pub fn sold_amount(&self) -> Decimal {
        self.total_supply - self.available_supply
    }

    pub fn stage(&self, now: DateTime<Utc>) -> crate::stage::Stage {
        crate::stage::classify(
            now,
            self.registration_start,
            self.registration_end,
            self.participation_start,
            self.participation_end,
            self.vault_type,
            crate::stage::threshold_met(self.total_supply, self.available_supply, self.vault_unlock_threshold),
        )
    }
}

/// A settled purchase, keyed by its deposit transaction hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub tx_hash: String,
    pub offering_id: String,
    pub buyer: Address,
    pub amount: Decimal,
    pub value: Decimal,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    pub offering_id: String,
    pub wallet: Address,
    #[serde(default)]
    pub purchased_amount: Decimal,
    #[serde(default)]
    pub deposited_value: Decimal,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WhitelistEntry {
    pub fn key_for(offering_id: &str, wallet: &Address) -> String {
        format!("{offering_id}:{wallet}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueEntry {
    pub id: String,
    pub beneficiary_id: String,
    pub offering_id: String,
    pub balance: Decimal,
    pub currency_contract: Address,
    /// USD rate of the currency when the entry was opened. Never rewritten.
    pub exchange_rate_at_approval: Decimal,
    pub is_withdrawn: bool,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalItem {
    /// Currency contract being withdrawn.
    pub contract_address: Address,
    pub offering_ids: Vec<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    pub beneficiary_id: String,
    pub status: WithdrawalStatus,
    pub revenue: Vec<WithdrawalItem>,
    pub recipient_address: Address,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub wallet: Address,
    pub role: AdminRole,
    pub status: RecordStatus,
    pub on_chain_status: OnChainStatus,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieringPool {
    pub pool_id: String,
    pub status: OnChainStatus,
    #[serde(default)]
    pub token: Option<Address>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakePosition {
    pub pool_id: String,
    pub account: Address,
    pub staked: Decimal,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StakePosition {
    pub fn key_for(pool_id: &str, account: &Address) -> String {
        format!("{pool_id}:{account}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeDirection {
    Stake,
    Unstake,
}

/// Applied stake/unstake transaction, keyed by tx hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeReceipt {
    pub tx_hash: String,
    pub pool_id: String,
    pub account: Address,
    pub amount: Decimal,
    pub direction: StakeDirection,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipelines_only_move_forward() {
        let mut s = AssetStatus::ConvertedToNft;
        assert!(!advance(&mut s, AssetStatus::IaoApproved));
        assert_eq!(s, AssetStatus::ConvertedToNft);
        assert!(advance(&mut s, AssetStatus::Fractionalized));
        assert!(!advance(&mut s, AssetStatus::Fractionalized));

        let mut c = CustodyStatus::Fractor;
        assert!(advance(&mut c, CustodyStatus::Frac));
        assert!(CustodyStatus::AvailableForRedeem > CustodyStatus::Frac);
        assert!(NftStatus::Redeemed > NftStatus::Fractionalized);
    }
}
