use super::{missing, HandlerResult, Reconciler};
use crate::error::ReconcileError;
use crate::event::{EventContext, SetAdmin};
use crate::model::{OnChainStatus, RecordStatus};

impl Reconciler {
    /// SetAdmin: the admin record adopts the on-chain role and active flag.
    pub async fn set_admin(&self, ctx: &EventContext, ev: &SetAdmin) -> HandlerResult {
        let target = if ev.is_active {
            RecordStatus::Active
        } else {
            RecordStatus::Inactive
        };
        self.store
            .transaction(|l| {
                let key = ev.wallet.to_string();
                let admin = l.admins.get(&key).ok_or_else(|| missing("admin", &key))?;
                if admin.on_chain_status == OnChainStatus::OnChain && admin.role == ev.role && admin.status == target {
                    return Err(ReconcileError::precondition(format!("admin {key} already in sync")));
                }
                l.admins.update(&key, |a| {
                    a.role = ev.role;
                    a.status = target;
                    a.on_chain_status = OnChainStatus::OnChain;
                })?;
                tracing::info!(wallet = %ev.wallet, role = ?ev.role, active = ev.is_active, record = %ctx.record_id, "admin synced");
                Ok(Vec::new())
            })
            .await
    }
}
