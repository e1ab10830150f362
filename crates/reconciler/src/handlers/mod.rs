//! Per-event state reconciliation.
//!
//! Every handler follows one shape: re-read the authoritative records by natural key inside a
//! store transaction, check the event's precondition, apply the transition and its cascades,
//! commit. A failed precondition is returned as [ReconcileError::Precondition], which aborts
//! the transaction; the dispatcher reports it as a skip. Side effects are returned, not fired.

mod admin;
mod asset;
mod offering;
mod revenue;
mod staking;

use crate::config::ReconcilerSettings;
use crate::effects::SideEffect;
use crate::error::ReconcileError;
use crate::event::EventContext;
use crate::rates::RateOracle;
use crate::store::MemoryStore;
use gateway::ChainRegistry;
use std::sync::Arc;

/// Result of one handler: effects to fire after commit.
pub type HandlerResult = Result<Vec<SideEffect>, ReconcileError>;

pub struct Reconciler {
    store: Arc<MemoryStore>,
    chains: Arc<ChainRegistry>,
    rates: Arc<dyn RateOracle>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<MemoryStore>,
        chains: Arc<ChainRegistry>,
        rates: Arc<dyn RateOracle>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            chains,
            rates,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Skip unless the event's transaction is mined and succeeded.
    async fn confirm_receipt(&self, ctx: &EventContext) -> Result<(), ReconcileError> {
        if !self.settings.verify_receipts {
            return Ok(());
        }
        let hash = ctx.tx_hash_b256()?;
        let gw = self.chains.gateway(ctx.chain_id).await?;
        match gw.get_transaction_receipt(hash).await? {
            None => Err(ReconcileError::precondition(format!("no receipt yet for {hash}"))),
            Some(r) if !r.success => Err(ReconcileError::precondition(format!("transaction {hash} reverted"))),
            Some(_) => Ok(()),
        }
    }
}

fn missing(what: &str, key: &str) -> ReconcileError {
    ReconcileError::precondition(format!("{what} {key} not found"))
}
