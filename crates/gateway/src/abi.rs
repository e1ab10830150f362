//! Contract kinds, ABI interfaces, and decoding of JSON-RPC log / transaction / receipt shapes.

use crate::error::GatewayError;
use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use serde::Deserialize;
use serde_json::Value;

/// Deployed contract families the reconciler talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Nft,
    Fnft,
    IaoEvent,
    Revenue,
    Staking,
}

impl std::fmt::Display for ContractKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContractKind::Nft => "nft",
            ContractKind::Fnft => "fnft",
            ContractKind::IaoEvent => "iao_event",
            ContractKind::Revenue => "revenue",
            ContractKind::Staking => "staking",
        };
        f.write_str(s)
    }
}

sol! {
    #[derive(Debug)]
    interface IFractorNft {
        function ownerOf(uint256 tokenId) external view returns (address);
        function tokenURI(uint256 tokenId) external view returns (string);
    }

    #[derive(Debug)]
    interface IFnft {
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// A log as returned by eth_getLogs or embedded in a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
}

/// Subset of eth_getTransactionByHash the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    /// None while pending.
    pub block_number: Option<u64>,
    pub value: U256,
    pub input: Vec<u8>,
}

/// Subset of eth_getTransactionReceipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: u64,
    pub logs: Vec<RawLog>,
}

fn field<'a>(v: &'a Value, name: &str) -> Result<&'a str, GatewayError> {
    v.get(name)
        .and_then(|n| n.as_str())
        .ok_or_else(|| GatewayError::Decode(format!("missing {name}")))
}

pub fn decode_log(v: &Value) -> Result<RawLog, GatewayError> {
    let topics = v
        .get("topics")
        .and_then(|t| t.as_array())
        .ok_or_else(|| GatewayError::Decode("missing topics".into()))?
        .iter()
        .map(|t| {
            t.as_str()
                .ok_or_else(|| GatewayError::Decode("topic not str".into()))
                .and_then(parse_b256)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawLog {
        address: parse_address(field(v, "address")?)?,
        topics,
        data: parse_hex_bytes(field(v, "data")?)?,
        block_number: parse_hex_u64(field(v, "blockNumber")?)?,
        tx_hash: parse_b256(field(v, "transactionHash")?)?,
        log_index: parse_hex_u64(field(v, "logIndex")?)?,
    })
}

pub fn decode_transaction(v: &Value) -> Result<TransactionInfo, GatewayError> {
    let to = match v.get("to").and_then(|t| t.as_str()) {
        Some(s) => Some(parse_address(s)?),
        None => None,
    };
    let block_number = match v.get("blockNumber").and_then(|b| b.as_str()) {
        Some(s) => Some(parse_hex_u64(s)?),
        None => None,
    };
    let value = match v.get("value").and_then(|b| b.as_str()) {
        Some(s) => parse_hex_u256(s)?,
        None => U256::ZERO,
    };
    let input = match v.get("input").and_then(|b| b.as_str()) {
        Some(s) => parse_hex_bytes(s)?,
        None => Vec::new(),
    };
    Ok(TransactionInfo {
        hash: parse_b256(field(v, "hash")?)?,
        from: parse_address(field(v, "from")?)?,
        to,
        block_number,
        value,
        input,
    })
}

pub fn decode_receipt(v: &Value) -> Result<ReceiptInfo, GatewayError> {
    // Pre-Byzantium receipts have no status; treat as success like the node does.
    let success = match v.get("status").and_then(|s| s.as_str()) {
        Some(s) => parse_hex_u64(s)? == 1,
        None => true,
    };
    let logs = match v.get("logs").and_then(|l| l.as_array()) {
        Some(arr) => arr.iter().map(decode_log).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(ReceiptInfo {
        tx_hash: parse_b256(field(v, "transactionHash")?)?,
        success,
        block_number: parse_hex_u64(field(v, "blockNumber")?)?,
        logs,
    })
}

pub fn parse_hex_u64(s: &str) -> Result<u64, GatewayError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| GatewayError::Decode(format!("hex u64: {e}")))
}

pub fn parse_hex_u256(s: &str) -> Result<U256, GatewayError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(s, 16).map_err(|e| GatewayError::Decode(format!("hex u256: {e}")))
}

pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, GatewayError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| GatewayError::Decode(format!("hex bytes: {e}")))
}

pub fn parse_b256(s: &str) -> Result<B256, GatewayError> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return Err(GatewayError::Decode(format!("expected 32 bytes, got {}", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

pub fn parse_address(s: &str) -> Result<Address, GatewayError> {
    let bytes = parse_hex_bytes(s)?;
    match bytes.len() {
        20 => Ok(Address::from_slice(&bytes)),
        // Indexed address in a topic is left-padded to 32 bytes.
        32 => Ok(Address::from_slice(&bytes[12..32])),
        n => Err(GatewayError::Decode(format!("expected 20 or 32 bytes for address, got {n}"))),
    }
}
