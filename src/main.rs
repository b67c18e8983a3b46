//! WAGERMILL — Sports Betting Market & Settlement Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores state from disk (or starts fresh), serves the betting API,
//! and runs the auto-settlement watchdog with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use wagermill::api;
use wagermill::api::routes::ApiState;
use wagermill::betting::ledger::{BetLedger, BetStore, MemoryBetStore};
use wagermill::config;
use wagermill::feeds::http::{HttpOddsFeed, HttpResultFeed};
use wagermill::market::MarketStore;
use wagermill::settlement::engine::SettlementEngine;
use wagermill::settlement::trigger::{AttemptRegistry, AutoSettlementTrigger};
use wagermill::storage::{self, EngineSnapshot};
use wagermill::wallet::MemoryWallet;

const BANNER: &str = r#"
__        ___    ____ _____ ____  __  __ ___ _     _
\ \      / / \  / ___| ____|  _ \|  \/  |_ _| |   | |
 \ \ /\ / / _ \| |  _|  _| | |_) | |\/| || || |   | |
  \ V  V / ___ \ |_| | |___|  _ <| |  | || || |___| |___
   \_/\_/_/   \_\____|_____|_| \_\_|  |_|___|_____|_____|

  Sports Betting Market & Settlement Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging(&cfg);

    // Print startup banner
    println!("{BANNER}");
    info!(
        engine_name = %cfg.engine.name,
        currency = %cfg.engine.currency,
        api_port = cfg.api.port,
        auto_settlement = cfg.settlement.auto_enabled,
        "WAGERMILL starting up"
    );

    // -- Core state stores ------------------------------------------------

    let markets = Arc::new(MarketStore::new());
    let bets = Arc::new(MemoryBetStore::new());
    let wallet = Arc::new(MemoryWallet::new(cfg.wallet.opening_balance));

    // Restore persisted markets and bets, if any
    if let Some(snapshot) = storage::load_snapshot(None)? {
        info!(
            markets = snapshot.markets.len(),
            bets = snapshot.bets.len(),
            "Resumed from saved snapshot"
        );
        markets.restore(snapshot.markets).await;
        bets.restore(snapshot.bets).await;
    } else {
        info!("Fresh start");
    }

    // -- Feed clients ------------------------------------------------------

    let timeout = Duration::from_secs(cfg.feeds.timeout_secs);
    let api_key = cfg
        .feeds
        .api_key_env
        .as_deref()
        .and_then(|env| std::env::var(env).ok());
    let odds_feed = Arc::new(HttpOddsFeed::new(
        &cfg.feeds.odds_base_url,
        api_key.as_deref(),
        timeout,
    )?);
    let result_feed = Arc::new(HttpResultFeed::new(
        &cfg.feeds.results_base_url,
        api_key.as_deref(),
        timeout,
    )?);

    // -- Engine components -------------------------------------------------

    let ledger = Arc::new(BetLedger::new(
        markets.clone(),
        wallet.clone(),
        bets.clone(),
    ));
    let engine = Arc::new(SettlementEngine::new(
        markets.clone(),
        bets.clone(),
        wallet.clone(),
        result_feed,
    ));
    let registry = Arc::new(AttemptRegistry::new());
    let trigger = AutoSettlementTrigger::new(
        engine.clone(),
        bets.clone(),
        markets.clone(),
        registry,
    );

    // -- API server --------------------------------------------------------

    if cfg.api.enabled {
        let state = Arc::new(ApiState {
            markets: markets.clone(),
            ledger,
            engine,
            odds: odds_feed,
        });
        api::spawn_api(state, cfg.api.port)?;
    }

    // -- Watchdog loop -----------------------------------------------------

    let scan_interval = Duration::from_secs(cfg.settlement.scan_interval_secs);
    let mut interval = tokio::time::interval(scan_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.settlement.scan_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if cfg.settlement.auto_enabled {
                    match trigger.run().await {
                        Ok(report) => {
                            if !report.triggered.is_empty() || !report.failed.is_empty() {
                                info!(
                                    triggered = report.triggered.len(),
                                    failed = report.failed.len(),
                                    already_attempted = report.already_attempted,
                                    underivable = report.underivable_bets,
                                    "Auto-settlement pass complete"
                                );
                            }
                        }
                        Err(e) => error!(error = %e, "Auto-settlement pass failed — continuing"),
                    }
                }

                // Persist state after each pass
                if let Err(e) = save_state(&markets, bets.as_ref()).await {
                    error!(error = %e, "Failed to save snapshot");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final state
    save_state(&markets, bets.as_ref()).await?;
    info!("WAGERMILL shut down cleanly.");

    Ok(())
}

/// Snapshot markets and bets to disk.
async fn save_state(markets: &MarketStore, bets: &MemoryBetStore) -> Result<()> {
    let snapshot = EngineSnapshot {
        markets: markets.snapshot().await,
        bets: bets.all().await?,
    };
    storage::save_snapshot(&snapshot, None)
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wagermill=info"));

    let json_logging = std::env::var("WAGERMILL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    let _ = cfg;
}
