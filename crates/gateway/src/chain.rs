//! Supported chain families.

use crate::error::GatewayError;

/// The two chain families the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Ethereum,
    BnbSmartChain,
}

const ETHEREUM_IDS: [u64; 3] = [1, 5, 11_155_111];
const BSC_IDS: [u64; 2] = [56, 97];

impl ChainFamily {
    /// Resolve a chain id against the allow-list. Anything else fails fast.
    pub fn of(chain_id: u64) -> Result<Self, GatewayError> {
        if ETHEREUM_IDS.contains(&chain_id) {
            Ok(ChainFamily::Ethereum)
        } else if BSC_IDS.contains(&chain_id) {
            Ok(ChainFamily::BnbSmartChain)
        } else {
            Err(GatewayError::UnsupportedChain(chain_id))
        }
    }

    pub fn chain_ids(self) -> &'static [u64] {
        match self {
            ChainFamily::Ethereum => &ETHEREUM_IDS,
            ChainFamily::BnbSmartChain => &BSC_IDS,
        }
    }
}
