//! Solidity-packed message signing (EIP-191 personal message over keccak256).

use crate::error::GatewayError;
use alloy::primitives::{Address, B256, U256};
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

/// One typed value of a packed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignField {
    Address(Address),
    Uint256(U256),
    Bytes32(B256),
    String(String),
    Bool(bool),
}

/// `abi.encodePacked` of the fields, in order.
pub fn encode_packed(fields: &[SignField]) -> Vec<u8> {
    let mut out = Vec::new();
    for f in fields {
        match f {
            SignField::Address(a) => out.extend_from_slice(a.as_slice()),
            SignField::Uint256(u) => out.extend_from_slice(&u.to_be_bytes::<32>()),
            SignField::Bytes32(b) => out.extend_from_slice(b.as_slice()),
            SignField::String(s) => out.extend_from_slice(s.as_bytes()),
            SignField::Bool(b) => out.push(u8::from(*b)),
        }
    }
    out
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest a contract verifies with `ECDSA.toEthSignedMessageHash(keccak256(abi.encodePacked(..)))`.
pub fn message_digest(fields: &[SignField]) -> [u8; 32] {
    let inner = keccak256(&encode_packed(fields));
    let mut prefixed = Vec::with_capacity(28 + 32);
    prefixed.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    prefixed.extend_from_slice(&inner);
    keccak256(&prefixed)
}

fn signing_key(key: &[u8]) -> Result<SigningKey, GatewayError> {
    SigningKey::from_slice(key).map_err(|e| GatewayError::Signing(e.to_string()))
}

/// Sign packed fields; returns 65 bytes `r || s || v` with `v` in {27, 28}.
pub fn sign(fields: &[SignField], key: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let sk = signing_key(key)?;
    let digest = message_digest(fields);
    let (sig, recid) = sk
        .sign_prehash_recoverable(&digest)
        .map_err(|e| GatewayError::Signing(e.to_string()))?;
    let mut out = sig.to_bytes().to_vec();
    out.push(27 + recid.to_byte());
    Ok(out)
}

/// Address controlled by a secp256k1 secret key.
pub fn address_of(key: &[u8]) -> Result<Address, GatewayError> {
    let sk = signing_key(key)?;
    let point = sk.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}
