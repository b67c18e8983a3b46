//! Shared fixtures for integration tests.
//!
//! Provides deterministic feed implementations with fully controllable
//! state — markets complete when the test says so, outcomes are
//! programmed per market name, and any operation can be forced to fail
//! to exercise retry paths. All in-memory with no external dependencies.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wagermill::betting::ledger::{BetLedger, BetStore, MemoryBetStore};
use wagermill::feeds::{MarketOutcome, OddsFeed, ResultFeed};
use wagermill::market::{MarketStore, ObservedOdds};
use wagermill::settlement::engine::SettlementEngine;
use wagermill::settlement::trigger::{AttemptRegistry, AutoSettlementTrigger};
use wagermill::types::{Bet, EngineError, Market, MarketKey, MarketType};
use wagermill::wallet::MemoryWallet;

/// Deterministic result feed for testing.
///
/// Completion status and per-market outcomes are fully controllable
/// from test code, and any operation can be forced to error.
pub struct StaticResultFeed {
    completed: Mutex<bool>,
    outcomes: Mutex<HashMap<String, MarketOutcome>>,
    /// If set, all operations will return a provider error with this message.
    force_error: Mutex<Option<String>>,
}

impl StaticResultFeed {
    pub fn new(completed: bool) -> Self {
        Self {
            completed: Mutex::new(completed),
            outcomes: Mutex::new(HashMap::new()),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_completed(&self, completed: bool) {
        *self.completed.lock().unwrap() = completed;
    }

    /// Program the outcome for a market name.
    pub fn set_outcome(&self, market_name: &str, outcome: MarketOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(market_name.to_string(), outcome);
    }

    /// Force all subsequent operations to return a provider error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    fn check_error(&self) -> Result<(), EngineError> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(EngineError::ProviderUnavailable {
                source_name: "static-result-feed".to_string(),
                message: msg,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResultFeed for StaticResultFeed {
    async fn match_completed(&self, _: &str, _: &str) -> Result<bool, EngineError> {
        self.check_error()?;
        Ok(*self.completed.lock().unwrap())
    }

    async fn market_outcome(&self, market: &Market) -> Result<MarketOutcome, EngineError> {
        self.check_error()?;
        self.outcomes
            .lock()
            .unwrap()
            .get(&market.key.market_name)
            .copied()
            .ok_or_else(|| EngineError::ProviderUnavailable {
                source_name: "static-result-feed".to_string(),
                message: format!("no outcome programmed for {}", market.key.market_name),
            })
    }
}

/// Bet store that fails a programmable number of `update` calls before
/// behaving normally, for exercising settlement retry paths.
pub struct FlakyBetStore {
    inner: MemoryBetStore,
    update_failures_left: Mutex<usize>,
}

impl FlakyBetStore {
    pub fn new(update_failures: usize) -> Self {
        Self {
            inner: MemoryBetStore::new(),
            update_failures_left: Mutex::new(update_failures),
        }
    }
}

#[async_trait]
impl BetStore for FlakyBetStore {
    async fn insert(&self, bet: Bet) -> Result<(), EngineError> {
        self.inner.insert(bet).await
    }

    async fn update(&self, bet: Bet) -> Result<(), EngineError> {
        {
            let mut left = self.update_failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(EngineError::Storage("transient update fault".to_string()));
            }
        }
        self.inner.update(bet).await
    }

    async fn get(&self, bet_id: &str) -> Result<Bet, EngineError> {
        self.inner.get(bet_id).await
    }

    async fn all(&self) -> Result<Vec<Bet>, EngineError> {
        self.inner.all().await
    }
}

/// Odds feed that serves a canned JSON payload.
pub struct StaticOddsFeed {
    payload: Mutex<serde_json::Value>,
}

impl StaticOddsFeed {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload: Mutex::new(payload),
        }
    }
}

#[async_trait]
impl OddsFeed for StaticOddsFeed {
    async fn fetch_match_odds(&self, _: &str) -> Result<serde_json::Value, EngineError> {
        Ok(self.payload.lock().unwrap().clone())
    }
}

/// Fully wired engine with deterministic feeds and in-memory stores.
pub struct TestEngine {
    pub markets: Arc<MarketStore>,
    pub bets: Arc<MemoryBetStore>,
    pub wallet: Arc<MemoryWallet>,
    pub results: Arc<StaticResultFeed>,
    pub ledger: BetLedger,
    pub engine: Arc<SettlementEngine>,
    pub registry: Arc<AttemptRegistry>,
}

impl TestEngine {
    pub fn new(opening_balance: Decimal) -> Self {
        let markets = Arc::new(MarketStore::new());
        let bets = Arc::new(MemoryBetStore::new());
        let wallet = Arc::new(MemoryWallet::new(opening_balance));
        let results = Arc::new(StaticResultFeed::new(true));
        let engine = Arc::new(SettlementEngine::new(
            markets.clone(),
            bets.clone(),
            wallet.clone(),
            results.clone(),
        ));
        let ledger = BetLedger::new(markets.clone(), wallet.clone(), bets.clone());
        Self {
            markets,
            bets,
            wallet,
            results,
            ledger,
            engine,
            registry: Arc::new(AttemptRegistry::new()),
        }
    }

    pub fn trigger(&self) -> AutoSettlementTrigger {
        AutoSettlementTrigger::new(
            self.engine.clone(),
            self.bets.clone(),
            self.markets.clone(),
            self.registry.clone(),
        )
    }

    /// Create an odds market for `(sports_id "4", match_id "m-1")`.
    pub async fn odds_market(&self, name: &str, selection: &str) -> Market {
        self.markets
            .get_or_create(
                MarketKey {
                    event_id: "evt-1".to_string(),
                    sport: "cricket".to_string(),
                    market_name: name.to_string(),
                    market_type: MarketType::Odds,
                    selection: selection.to_string(),
                },
                "4",
                "m-1",
                ObservedOdds {
                    odds_back: dec!(2.5),
                    odds_lay: dec!(2.52),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    /// Create a session market for `(sports_id "4", match_id "m-1")`.
    pub async fn session_market(&self, name: &str, rate: Decimal) -> Market {
        self.markets
            .get_or_create(
                MarketKey {
                    event_id: "evt-1".to_string(),
                    sport: "cricket".to_string(),
                    market_name: name.to_string(),
                    market_type: MarketType::Session,
                    selection: name.to_string(),
                },
                "4",
                "m-1",
                ObservedOdds {
                    rate_yes: rate,
                    rate_no: rate - dec!(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }
}
