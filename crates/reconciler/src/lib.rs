//! Reconciliation of on-chain contract events into off-chain ledgers.
//!
//! - **Dispatcher**: normalizes an [InboundEvent], routes it to its handler, fires side
//!   effects after commit and reports the outcome. Never fails.
//! - **Reconciler**: one idempotent handler per contract event; each runs as one store
//!   transaction guarded by a precondition.
//! - **Revenue ledger**: one open entry per (beneficiary, offering, currency), closed once
//!   on withdrawal.
//! - **Stage**: pure classification of an offering's lifecycle stage.

pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod event;
pub mod handlers;
pub mod model;
pub mod rates;
pub mod revenue;
pub mod stage;
pub mod store;

pub use config::{Config, PartnerConfig, ReconcilerSettings};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use effects::{Effects, EmailQueue, HttpPartnerApi, LogMailQueue, LogNotifier, Notifier, PartnerApi, SideEffect};
pub use error::{EffectError, ReconcileError, StoreError};
pub use event::{normalize, EventPayload, InboundEvent, NormalizedEvent};
pub use handlers::Reconciler;
pub use rates::{FixedRates, RateOracle};
pub use stage::{classify, Stage};
pub use store::{Ledgers, MemoryStore, Seed};
