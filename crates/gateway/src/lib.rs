//! Multi-chain JSON-RPC gateway.
//!
//! - **ChainRegistry**: built once at startup; provisions one synced endpoint per chain id
//!   (random pick, rotate while the node reports syncing, bounded) and caches it.
//! - **ChainGateway**: transactions, receipts, past events and cached [ContractHandle]s for
//!   one chain. Transient RPC failures are retried with a fixed delay; reverts are typed
//!   and returned immediately.

pub mod abi;
pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod gateway;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod signer;
pub mod transport;

pub use abi::{ContractKind, RawLog, ReceiptInfo, TransactionInfo};
pub use chain::ChainFamily;
pub use config::{ChainEndpoint, GatewayConfig, ProvisioningConfig, RetryConfig};
pub use contract::ContractHandle;
pub use error::{GatewayError, TransientKind};
pub use gateway::ChainGateway;
pub use provider::Provider;
pub use registry::ChainRegistry;
pub use signer::SignField;
pub use transport::{HttpTransport, RpcTransport};
