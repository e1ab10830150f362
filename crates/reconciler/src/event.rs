//! Inbound event envelope and its normalization into a typed payload.

use crate::error::ReconcileError;
use crate::model::AdminRole;
use alloy::primitives::{Address, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An event as delivered by the chain watcher. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub record_id: String,
    pub event_name: String,
    pub chain_id: u64,
    pub contract_address: Address,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdmin {
    pub wallet: Address,
    pub role: AdminRole,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintFnft {
    pub fnft_id: String,
    pub token_address: Address,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FnftRef {
    pub fnft_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingRef {
    pub iao_event_id: String,
    #[serde(default)]
    pub sender: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDeposit {
    pub iao_event_id: String,
    pub buyer: Address,
    /// Fractional tokens bought.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Currency paid.
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueApproval {
    pub iao_event_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub sender: Address,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueClaim {
    pub request_id: String,
    pub currency_contract: Address,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeChange {
    pub pool_id: String,
    pub account: Address,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieringPoolCreated {
    pub pool_id: String,
    #[serde(default)]
    pub token: Option<Address>,
}

/// One variant per handled contract event; the variant name on the wire is the event name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "eventName", content = "metadata")]
pub enum EventPayload {
    SetAdmin(SetAdmin),
    #[serde(rename = "MintNFT")]
    MintNft(TokenRef),
    #[serde(rename = "MintFNFT")]
    MintFnft(MintFnft),
    #[serde(rename = "CreateIAOEvent")]
    CreateIaoEvent(OfferingRef),
    #[serde(rename = "DeactivateFNFT")]
    DeactivateFnft(FnftRef),
    #[serde(rename = "DeactivateIAOEvent")]
    DeactivateIaoEvent(OfferingRef),
    #[serde(rename = "DepositNFT")]
    DepositNft(AssetRef),
    Deposit(FundDeposit),
    #[serde(rename = "MergeFNFT")]
    MergeFnft(FnftRef),
    #[serde(rename = "ApproveIAORevenue")]
    ApproveIaoRevenue(RevenueApproval),
    #[serde(rename = "RejectIAORevenue")]
    RejectIaoRevenue(OfferingRef),
    ClaimRevenue(RevenueClaim),
    #[serde(rename = "RedeemNFT")]
    RedeemNft(TokenRef),
    Stake(StakeChange),
    Unstake(StakeChange),
    CreateTieringPool(TieringPoolCreated),
}

pub const KNOWN_EVENTS: &[&str] = &[
    "SetAdmin",
    "MintNFT",
    "MintFNFT",
    "CreateIAOEvent",
    "DeactivateFNFT",
    "DeactivateIAOEvent",
    "DepositNFT",
    "Deposit",
    "MergeFNFT",
    "ApproveIAORevenue",
    "RejectIAORevenue",
    "ClaimRevenue",
    "RedeemNFT",
    "Stake",
    "Unstake",
    "CreateTieringPool",
];

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::SetAdmin(_) => "SetAdmin",
            EventPayload::MintNft(_) => "MintNFT",
            EventPayload::MintFnft(_) => "MintFNFT",
            EventPayload::CreateIaoEvent(_) => "CreateIAOEvent",
            EventPayload::DeactivateFnft(_) => "DeactivateFNFT",
            EventPayload::DeactivateIaoEvent(_) => "DeactivateIAOEvent",
            EventPayload::DepositNft(_) => "DepositNFT",
            EventPayload::Deposit(_) => "Deposit",
            EventPayload::MergeFnft(_) => "MergeFNFT",
            EventPayload::ApproveIaoRevenue(_) => "ApproveIAORevenue",
            EventPayload::RejectIaoRevenue(_) => "RejectIAORevenue",
            EventPayload::ClaimRevenue(_) => "ClaimRevenue",
            EventPayload::RedeemNft(_) => "RedeemNFT",
            EventPayload::Stake(_) => "Stake",
            EventPayload::Unstake(_) => "Unstake",
            EventPayload::CreateTieringPool(_) => "CreateTieringPool",
        }
    }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub record_id: String,
    pub chain_id: u64,
    pub contract_address: Address,
    /// Lowercase 0x-prefixed hash, when the watcher supplied one.
    pub tx_hash: Option<String>,
}

impl EventContext {
    /// Transaction hash, required by handlers that key on it.
    pub fn require_tx_hash(&self) -> Result<&str, ReconcileError> {
        self.tx_hash
            .as_deref()
            .ok_or_else(|| ReconcileError::Malformed(format!("record {} has no transactionHash", self.record_id)))
    }

    pub fn tx_hash_b256(&self) -> Result<B256, ReconcileError> {
        let hash = self.require_tx_hash()?;
        hash.parse::<B256>()
            .map_err(|e| ReconcileError::Malformed(format!("bad transactionHash {hash}: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub context: EventContext,
    pub payload: EventPayload,
}

/// Decode `raw` into a typed event. `Ok(None)` for event names nobody handles.
pub fn normalize(raw: &InboundEvent) -> Result<Option<NormalizedEvent>, ReconcileError> {
    if !KNOWN_EVENTS.contains(&raw.event_name.as_str()) {
        return Ok(None);
    }
    let tagged = json!({ "eventName": raw.event_name, "metadata": raw.metadata });
    let payload: EventPayload = serde_json::from_value(tagged)
        .map_err(|e| ReconcileError::Malformed(format!("{} metadata: {e}", raw.event_name)))?;
    let tx_hash = match raw.transaction_hash.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(h) if h.starts_with("0x") || h.starts_with("0X") => Some(format!("0x{}", h[2..].to_ascii_lowercase())),
        Some(h) => Some(format!("0x{}", h.to_ascii_lowercase())),
    };
    Ok(Some(NormalizedEvent {
        context: EventContext {
            record_id: raw.record_id.clone(),
            chain_id: raw.chain_id,
            contract_address: raw.contract_address,
            tx_hash,
        },
        payload,
    }))
}
