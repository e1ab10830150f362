//! Example: replay delivered contract events against seeded ledgers and print each outcome.
//!
//! Reads a config file (RPC endpoints, contract addresses, exchange rates, partner API), a
//! seed file with the records created by administrative actions, and inbound events as JSON
//! lines (one `{recordId, eventName, chainId, contractAddress, transactionHash, metadata}` per
//! line) from `--events` or stdin. Prints one report per event, then the final offerings.
//!
//! Usage:
//!
//!   cargo run -p reconciler --example replay_events -- --config config.json --seed seed.json --events events.jsonl
//!
//! Set PARTNER_API_KEY to override the partner key from the config file.

use anyhow::{Context, Result};
use gateway::{ChainRegistry, HttpTransport};
use reconciler::effects::DisabledPartnerApi;
use reconciler::{
    Config, Dispatcher, Effects, FixedRates, HttpPartnerApi, InboundEvent, Ledgers, LogMailQueue, LogNotifier,
    MemoryStore, PartnerApi, Reconciler, Seed,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("Usage: replay_events --config <CONFIG_JSON> [--seed <SEED_JSON>] [--events <EVENTS_JSONL>]");
    eprintln!("       (events are read from stdin when --events is omitted)");
    std::process::exit(1);
}

async fn read_events(reader: impl AsyncRead + Unpin) -> Result<Vec<InboundEvent>> {
    let mut lines = BufReader::new(reader).lines();
    let mut events = Vec::new();
    let mut n = 0;
    while let Some(line) = lines.next_line().await? {
        n += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: InboundEvent = serde_json::from_str(line).with_context(|| format!("event on line {n}"))?;
        events.push(event);
    }
    Ok(events)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path = String::new();
    let mut seed_path = String::new();
    let mut events_path = String::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = args.get(i).cloned().unwrap_or_default();
            }
            "--seed" => {
                i += 1;
                seed_path = args.get(i).cloned().unwrap_or_default();
            }
            "--events" => {
                i += 1;
                events_path = args.get(i).cloned().unwrap_or_default();
            }
            "--help" | "-h" => usage(),
            _ => {}
        }
        i += 1;
    }
    if config_path.is_empty() {
        usage();
    }

    let config = Config::from_file(&config_path)?;
    let ledgers = if seed_path.is_empty() {
        Ledgers::default()
    } else {
        let raw = tokio::fs::read_to_string(&seed_path)
            .await
            .with_context(|| format!("read {seed_path}"))?;
        let seed: Seed = serde_json::from_str(&raw).context("parse seed")?;
        Ledgers::from(seed)
    };
    let events = if events_path.is_empty() {
        read_events(tokio::io::stdin()).await?
    } else {
        let file = tokio::fs::File::open(&events_path)
            .await
            .with_context(|| format!("open {events_path}"))?;
        read_events(file).await?
    };

    let transport = Arc::new(HttpTransport::new(Duration::from_secs(15))?);
    let registry = Arc::new(ChainRegistry::new(config.gateway.clone(), transport));
    let rates = Arc::new(FixedRates::from_config(&config.exchange_rates)?);
    let store = Arc::new(MemoryStore::new(ledgers));
    let reconciler = Arc::new(Reconciler::new(store.clone(), registry, rates, config.reconciler.clone()));

    let partner: Arc<dyn PartnerApi> = if config.partner.base_url.is_empty() {
        Arc::new(DisabledPartnerApi)
    } else {
        Arc::new(HttpPartnerApi::new(
            config.partner.base_url.clone(),
            config.partner.api_key.clone(),
            Duration::from_secs(config.partner.timeout_secs),
        )?)
    };
    let effects = Effects {
        notifier: Arc::new(LogNotifier),
        mailer: Arc::new(LogMailQueue),
        partner,
    };
    let dispatcher = Dispatcher::new(reconciler, effects);

    tracing::info!(count = events.len(), "replaying events");
    for event in events {
        let record = event.record_id.clone();
        let name = event.event_name.clone();
        let report = dispatcher.dispatch(event).await;
        println!("{record}\t{name}\t{report:?}");
    }

    let now = chrono::Utc::now();
    let final_state = store.snapshot().await;
    for offering in final_state.offerings.find(|_| true) {
        println!(
            "{}\tavailable={}\tsold={}\tstage={:?}",
            offering.id,
            offering.available_supply,
            offering.sold_amount(),
            offering.stage(now)
        );
    }
    Ok(())
}
