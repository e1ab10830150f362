//! Shared fixtures: an in-process fake chain, recording side-effect sinks and seed builders.
#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gateway::abi::{IFnft, IFractorNft};
use gateway::{
    ChainEndpoint, ChainRegistry, ContractKind, GatewayConfig, GatewayError, ProvisioningConfig, RetryConfig,
    RpcTransport, TransientKind,
};
use reconciler::effects::{CoinListing, EmailMessage, FeeNotice};
use reconciler::model::*;
use reconciler::store::Collection;
use reconciler::{
    Dispatcher, EffectError, EmailQueue, Effects, FixedRates, InboundEvent, Ledgers, MemoryStore, Notifier,
    PartnerApi, RateOracle, Reconciler, ReconcilerSettings,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

pub const CHAIN: u64 = 97;
pub const URL: &str = "http://bsc-testnet.local";
pub const NFT: &str = "0x00000000000000000000000000000000000000aa";
pub const FNFT_TOKEN: &str = "0x00000000000000000000000000000000000000bb";
pub const TOKEN_OWNER: &str = "0x00000000000000000000000000000000000000ee";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reconciler=debug".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

pub fn usdt() -> Address {
    Address::repeat_byte(0xcc)
}

pub fn buyer(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub fn tx(n: u64) -> String {
    format!("0x{:064x}", n)
}

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

/// Fake BSC testnet node: always synced, receipts succeed unless listed as reverted,
/// NFT tokens exist unless listed as unminted, the fractional token has 1000 × 10^18 supply.
/// With `receipts_down` set, every receipt lookup is refused.
#[derive(Default)]
pub struct FakeChain {
    pub reverted: Mutex<HashSet<String>>,
    pub unminted: Mutex<HashSet<U256>>,
    pub receipts_down: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeChain {
    pub fn take_receipts_down(&self) {
        self.receipts_down.store(true, Ordering::SeqCst);
    }

    pub fn revert(&self, hash: &str) {
        self.reverted.lock().unwrap().insert(hash.to_string());
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    fn eth_call(&self, params: &Value) -> Result<Value, GatewayError> {
        let to: Address = params[0]["to"].as_str().unwrap().parse().unwrap();
        let data = params[0]["data"].as_str().unwrap().trim_start_matches("0x").to_string();
        let selector = &data[..8];
        if to == NFT.parse::<Address>().unwrap() && selector == hex::encode(IFractorNft::ownerOfCall::SELECTOR) {
            let token_id = U256::from_str_radix(&data[8..], 16).unwrap();
            if self.unminted.lock().unwrap().contains(&token_id) {
                return Err(GatewayError::from_rpc(3, "execution reverted: ERC721: invalid token ID"));
            }
            return Ok(json!(format!("0x{:0>64}", TOKEN_OWNER.trim_start_matches("0x"))));
        }
        if to == FNFT_TOKEN.parse::<Address>().unwrap() {
            if selector == hex::encode(IFnft::totalSupplyCall::SELECTOR) {
                let supply = U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18u64));
                return Ok(json!(format!("0x{:064x}", supply)));
            }
            if selector == hex::encode(IFnft::decimalsCall::SELECTOR) {
                return Ok(json!(format!("0x{:064x}", 18)));
            }
        }
        Err(GatewayError::from_rpc(3, "execution reverted"))
    }
}

#[async_trait]
impl RpcTransport for FakeChain {
    async fn request(&self, _url: &str, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.calls.lock().unwrap().push(method.to_string());
        match method {
            "eth_syncing" => Ok(json!(false)),
            "eth_getTransactionReceipt" if self.receipts_down.load(Ordering::SeqCst) => {
                Err(GatewayError::transient(TransientKind::ConnectionRefused, "down"))
            }
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap().to_string();
                let status = if self.reverted.lock().unwrap().contains(&hash) {
                    "0x0"
                } else {
                    "0x1"
                };
                Ok(json!({
                    "transactionHash": hash,
                    "status": status,
                    "blockNumber": "0x10",
                    "logs": [],
                }))
            }
            "eth_call" => self.eth_call(&params),
            other => Err(GatewayError::Rpc {
                code: -32601,
                message: format!("unexpected {other}"),
            }),
        }
    }
}

/// Records every side effect as `kind:detail`.
#[derive(Default)]
pub struct Recorder {
    pub log: Mutex<Vec<String>>,
    pub fail_partner: bool,
}

impl Recorder {
    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn emit(&self, namespace: &str, event: &str, _payload: &Value) -> Result<(), EffectError> {
        self.log.lock().unwrap().push(format!("emit:{namespace}:{event}"));
        Ok(())
    }
}

#[async_trait]
impl EmailQueue for Recorder {
    async fn enqueue(&self, message: &EmailMessage) -> Result<(), EffectError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("email:{}:{}", message.template, message.recipient_id));
        Ok(())
    }
}

#[async_trait]
impl PartnerApi for Recorder {
    async fn list_coin(&self, listing: &CoinListing) -> Result<(), EffectError> {
        if self.fail_partner {
            return Err(EffectError::Rejected { status: 503 });
        }
        self.log.lock().unwrap().push(format!("coin:{}", listing.fnft_id));
        Ok(())
    }

    async fn notify_fee(&self, notice: &FeeNotice) -> Result<(), EffectError> {
        if self.fail_partner {
            return Err(EffectError::Rejected { status: 503 });
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("fee:{}:{}", notice.offering_id, notice.platform_fee));
        Ok(())
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub store: Arc<MemoryStore>,
    pub chain: Arc<FakeChain>,
    pub recorder: Arc<Recorder>,
}

impl Harness {
    pub fn new(ledgers: Ledgers) -> Self {
        Self::with(ledgers, Recorder::default())
    }

    pub fn with(ledgers: Ledgers, recorder: Recorder) -> Self {
        let rates = Arc::new(FixedRates::new([(usdt(), Decimal::ONE)]));
        Self::build(Arc::new(MemoryStore::new(ledgers)), recorder, rates)
    }

    pub fn build(store: Arc<MemoryStore>, recorder: Recorder, rates: Arc<dyn RateOracle>) -> Self {
        init_tracing();
        let chain = Arc::new(FakeChain::default());
        let config = GatewayConfig {
            endpoints: vec![ChainEndpoint {
                chain_id: CHAIN,
                urls: vec![URL.to_string()],
                contracts: [(ContractKind::Nft, NFT.parse::<Address>().unwrap())].into_iter().collect(),
            }],
            retry: RetryConfig {
                max_attempts: 3,
                delay_ms: 0,
            },
            provisioning: ProvisioningConfig {
                max_attempts: 2,
                cooldown_ms: 0,
            },
            getlogs_max_range: 100,
        };
        let registry = Arc::new(ChainRegistry::new(config, chain.clone()));
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            registry,
            rates,
            ReconcilerSettings::default(),
        ));
        let recorder = Arc::new(recorder);
        let effects = Effects {
            notifier: recorder.clone(),
            mailer: recorder.clone(),
            partner: recorder.clone(),
        };
        Self {
            dispatcher: Dispatcher::new(reconciler, effects),
            store,
            chain,
            recorder,
        }
    }

    pub async fn ledgers(&self) -> Ledgers {
        self.store.snapshot().await
    }
}

pub fn event(name: &str, tx_hash: Option<&str>, metadata: Value) -> InboundEvent {
    InboundEvent {
        record_id: format!("rec-{name}-{}", tx_hash.unwrap_or("none")),
        event_name: name.to_string(),
        chain_id: CHAIN,
        contract_address: NFT.parse().unwrap(),
        transaction_hash: tx_hash.map(str::to_string),
        metadata,
    }
}

pub fn asset(id: &str, status: AssetStatus, custody: CustodyStatus) -> Asset {
    Asset {
        id: id.into(),
        owner_id: "owner".into(),
        status,
        custody,
        updated_at: Utc::now(),
    }
}

pub fn nft(token_id: &str, asset_id: &str, status: NftStatus) -> Nft {
    Nft {
        token_id: token_id.into(),
        asset_id: asset_id.into(),
        status,
        owner: None,
        fnft_id: None,
        updated_at: Utc::now(),
    }
}

pub fn fnft(id: &str, nft_ids: &[&str], status: FnftStatus, supply: i64) -> Fnft {
    Fnft {
        id: id.into(),
        token_address: None,
        nft_ids: nft_ids.iter().map(|s| s.to_string()).collect(),
        status,
        total_supply: Decimal::from(supply),
        available_supply: Decimal::from(supply),
        updated_at: Utc::now(),
    }
}

/// Vault offering on chain: registration [t0, t0+7d), participation [t0+10d, t0+20d).
pub fn offering(id: &str, fnft_id: &str, total: i64) -> Offering {
    Offering {
        id: id.into(),
        fnft_id: fnft_id.into(),
        beneficiary_id: "owner".into(),
        bd_id: None,
        currency_contract: usdt(),
        status: RecordStatus::Active,
        on_chain_status: OnChainStatus::OnChain,
        total_supply: Decimal::from(total),
        available_supply: Decimal::from(total),
        sold_value: Decimal::ZERO,
        vault_type: VaultType::Vault,
        vault_unlock_threshold: Decimal::from(50),
        registration_start: t0(),
        registration_end: t0() + Duration::days(7),
        participation_start: t0() + Duration::days(10),
        participation_end: t0() + Duration::days(20),
        revenue: OfferingRevenue {
            status: RevenueStatus::Pending,
            platform_commission_rate: Decimal::from(10),
            bd_commission_rate: Decimal::from(5),
            finalized_by: None,
            finalized_on: None,
            approved_transactions: Vec::new(),
            platform_commission: Decimal::ZERO,
        },
        updated_at: Utc::now(),
    }
}

/// Minted NFT "1" on asset "a1", fractionalized into active "f1" (1000), offered as "iao-1".
pub fn offering_ledgers() -> Ledgers {
    let mut f = fnft("f1", &["1"], FnftStatus::Active, 1_000);
    f.token_address = Some(FNFT_TOKEN.parse().unwrap());
    let mut n = nft("1", "a1", NftStatus::Fractionalized);
    n.fnft_id = Some("f1".into());
    Ledgers {
        assets: Collection::from_docs([asset("a1", AssetStatus::IaoEvent, CustodyStatus::Frac)]),
        nfts: Collection::from_docs([n]),
        fnfts: Collection::from_docs([f]),
        offerings: Collection::from_docs([offering("iao-1", "f1", 1_000)]),
        ..Ledgers::default()
    }
}

pub fn deposit(iao: &str, who: Address, amount: i64, value: i64) -> Value {
    json!({
        "iaoEventId": iao,
        "buyer": who.to_string(),
        "amount": amount.to_string(),
        "value": value.to_string(),
    })
}
