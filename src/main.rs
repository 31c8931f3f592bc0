//! OmniSweep backend entrypoint
//!
//! Modes:
//! - `api` (default): serve the HTTP API
//! - `listener`: run only the on-chain event subscriptions
//! - `demo`: run one orchestrated sweep against the fixture backend

use std::sync::Arc;

use omnisweep::api::{start_server, AppState};
use omnisweep::chain::{live::connect, ChainReader, FixtureChainReader, LiveChainReader};
use omnisweep::common::{OmniSweepError, Result};
use omnisweep::config::{DataSource, OmniSweepConfig};
use omnisweep::contracts::{Chain, TEST_DUST_TOKEN};
use omnisweep::events::{subscribe_dust_swept, subscribe_sweep_receipts, EventSubscription};
use omnisweep::executor::SweepExecutor;
use omnisweep::logging::init_from_config;
use omnisweep::orchestrator::{demo_orchestrator, StatsSettlementWatcher, SweepOrchestrator};
use omnisweep::quote::QuoteClient;
use omnisweep::signer::BackendSigner;
use omnisweep::tracker::TransactionTracker;

use alloy_primitives::{Address, U256};
use tracing::info;

fn print_usage() {
    println!("usage: omnisweep-api [MODE]");
    println!();
    println!("modes:");
    println!("  api       serve the HTTP API (default)");
    println!("  listener  run the on-chain event subscriptions only");
    println!("  demo      run one orchestrated sweep against fixtures");
    println!("  help      show this message");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "api".to_string());
    let result = match mode.as_str() {
        "api" => run_api().await,
        "listener" => run_listener().await,
        "demo" => run_demo().await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("unknown mode: {}", other);
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run_api() -> Result<()> {
    let config = OmniSweepConfig::from_env()?;
    init_from_config(&config).map_err(|e| OmniSweepError::internal(e.to_string()))?;
    config.print_summary();

    let state = build_state(&config)?;

    let _subscriptions = if config.enable_event_listener && config.data_source == DataSource::Live {
        Some(spawn_subscriptions(&config)?)
    } else {
        None
    };

    start_server(state).await
}

fn build_state(config: &OmniSweepConfig) -> Result<AppState> {
    let quotes = Arc::new(QuoteClient::from_config(config));

    match config.data_source {
        DataSource::Fixture => {
            let reader = Arc::new(FixtureChainReader::new());
            let orchestrator = Arc::new(demo_orchestrator(reader.clone(), quotes.clone()));

            Ok(AppState {
                config: Arc::new(config.clone()),
                reader,
                quotes,
                executor: Arc::new(SweepExecutor::read_only()),
                orchestrator,
            })
        }
        DataSource::Live => {
            let signer = BackendSigner::from_config(config)
                .map_err(|e| OmniSweepError::internal(e.to_string()))?;
            let reader: Arc<dyn ChainReader> = Arc::new(LiveChainReader::from_config(config)?);
            let executor = Arc::new(SweepExecutor::new(
                signer,
                config.rpc_url(Chain::EthSepolia),
            )?);

            let orchestrator = Arc::new(SweepOrchestrator::new(
                reader.clone(),
                quotes.clone(),
                executor.clone(),
                Arc::new(TransactionTracker::new(reader.clone())),
                Arc::new(StatsSettlementWatcher::new(reader.clone())),
            ));

            Ok(AppState {
                config: Arc::new(config.clone()),
                reader,
                quotes,
                executor,
                orchestrator,
            })
        }
    }
}

fn spawn_subscriptions(config: &OmniSweepConfig) -> Result<Vec<EventSubscription>> {
    let sepolia = connect(config.rpc_url(Chain::EthSepolia))?;
    let fuji = connect(config.rpc_url(Chain::AvalancheFuji))?;

    let swept = subscribe_dust_swept(sepolia, |event| {
        info!(
            target: "omnisweep::events",
            user = %event.user,
            token = %event.token_in,
            amount_in = %event.amount_in,
            usdc_out = %event.usdc_out,
            "DustSwept observed"
        );
    });

    let receipts = subscribe_sweep_receipts(fuji, |event| {
        info!(
            target: "omnisweep::events",
            user = %event.user,
            amount = %event.amount,
            src_chain = event.src_chain_id,
            "SweepReceipt observed"
        );
    });

    Ok(vec![swept, receipts])
}

async fn run_listener() -> Result<()> {
    let config = OmniSweepConfig::from_env()?;
    init_from_config(&config).map_err(|e| OmniSweepError::internal(e.to_string()))?;

    let subscriptions = spawn_subscriptions(&config)?;
    println!("event listener running, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    for sub in subscriptions {
        sub.cancel().await;
    }
    Ok(())
}

async fn run_demo() -> Result<()> {
    let config = OmniSweepConfig::from_env()?;
    init_from_config(&config).map_err(|e| OmniSweepError::internal(e.to_string()))?;

    let reader = Arc::new(FixtureChainReader::new());
    let quotes = Arc::new(QuoteClient::from_config(&config));
    let orchestrator = demo_orchestrator(reader, quotes);

    let user = Address::from([0x42u8; 20]);
    let amount = U256::from(10u64).pow(U256::from(19u64)); // 10 DUST

    println!("running demo sweep: 10 DUST for {}", user);
    let attempt = orchestrator.run_sweep(user, TEST_DUST_TOKEN, amount).await?;

    let rendered = serde_json::to_string_pretty(&attempt)
        .map_err(|e| OmniSweepError::internal(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
