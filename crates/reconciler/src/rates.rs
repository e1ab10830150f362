//! USD exchange rates captured when revenue is approved.

use crate::error::ReconcileError;
use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[async_trait]
pub trait RateOracle: Send + Sync {
    /// USD price of one unit of `currency` on `chain_id`.
    async fn usd_rate(&self, chain_id: u64, currency: Address) -> Result<Decimal, ReconcileError>;
}

/// Static rate table.
#[derive(Debug, Clone, Default)]
pub struct FixedRates {
    rates: HashMap<Address, Decimal>,
}

impl FixedRates {
    pub fn new(rates: impl IntoIterator<Item = (Address, Decimal)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }

    /// Build from config, where currency addresses are hex strings.
    pub fn from_config(raw: &HashMap<String, Decimal>) -> Result<Self, ReconcileError> {
        let rates = raw
            .iter()
            .map(|(k, v)| {
                k.parse::<Address>()
                    .map(|a| (a, *v))
                    .map_err(|e| ReconcileError::Rate(format!("bad currency address {k}: {e}")))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { rates })
    }

    pub fn set(&mut self, currency: Address, rate: Decimal) {
        self.rates.insert(currency, rate);
    }
}

#[async_trait]
impl RateOracle for FixedRates {
    async fn usd_rate(&self, _chain_id: u64, currency: Address) -> Result<Decimal, ReconcileError> {
        match self.rates.get(&currency) {
            Some(r) if *r > Decimal::ZERO => Ok(*r),
            Some(r) => Err(ReconcileError::Rate(format!("non-positive rate {r} for {currency}"))),
            None => Err(ReconcileError::Rate(format!("no rate for {currency}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup() {
        let mut raw = HashMap::new();
        raw.insert("0x00000000000000000000000000000000000000cc".to_string(), Decimal::ONE);
        let rates = FixedRates::from_config(&raw).unwrap();
        let usdt: Address = "0x00000000000000000000000000000000000000cc".parse().unwrap();
        assert_eq!(rates.usd_rate(97, usdt).await.unwrap(), Decimal::ONE);
        assert!(rates.usd_rate(97, Address::ZERO).await.is_err());
    }
}
