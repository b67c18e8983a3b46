//! Auto-settlement trigger.
//!
//! Opportunistic watchdog that scans unsettled bets, derives each one's
//! `(sports_id, match_id)` pair, and invokes the settlement engine once
//! per match per process lifetime. The attempted-set is an explicit,
//! injectable registry rather than ambient global state: cleared per
//! process start, and un-marked on failure so a later pass retries.
//!
//! This is a convenience/resilience mechanism, not the system of record.
//! Redundant invocations are safe (the engine skips settled markets) and
//! the operator settlement route works without it.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::betting::ledger::BetStore;
use crate::market::MarketStore;
use crate::settlement::engine::SettlementEngine;
use crate::types::{Bet, EngineError, Market};

/// Fallback sport-name → result-feed sport id table, for bets whose
/// market rows predate the correlation fields.
const SPORT_IDS: &[(&str, &str)] = &[
    ("soccer", "1"),
    ("football", "1"),
    ("tennis", "2"),
    ("cricket", "4"),
];

// ---------------------------------------------------------------------------
// Attempt registry
// ---------------------------------------------------------------------------

/// Tracks which matches this process has already attempted to settle.
#[derive(Default)]
pub struct AttemptRegistry {
    attempted: Mutex<HashSet<(String, String)>>,
}

impl AttemptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a match attempted. Returns false if it already was.
    pub async fn try_begin(&self, sports_id: &str, match_id: &str) -> bool {
        self.attempted
            .lock()
            .await
            .insert((sports_id.to_string(), match_id.to_string()))
    }

    /// Forget an attempt so a future pass may retry.
    pub async fn clear(&self, sports_id: &str, match_id: &str) {
        self.attempted
            .lock()
            .await
            .remove(&(sports_id.to_string(), match_id.to_string()));
    }

    pub async fn len(&self) -> usize {
        self.attempted.lock().await.len()
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Summary of one trigger pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerReport {
    /// Matches for which a settlement pass ran.
    pub triggered: Vec<(String, String)>,
    /// Matches skipped because this process already attempted them.
    pub already_attempted: usize,
    /// Bets with no derivable match identity.
    pub underivable_bets: usize,
    /// Matches whose settlement pass failed (cleared for retry).
    pub failed: Vec<(String, String)>,
}

pub struct AutoSettlementTrigger {
    engine: Arc<SettlementEngine>,
    bets: Arc<dyn BetStore>,
    markets: Arc<MarketStore>,
    registry: Arc<AttemptRegistry>,
}

impl AutoSettlementTrigger {
    pub fn new(
        engine: Arc<SettlementEngine>,
        bets: Arc<dyn BetStore>,
        markets: Arc<MarketStore>,
        registry: Arc<AttemptRegistry>,
    ) -> Self {
        Self {
            engine,
            bets,
            markets,
            registry,
        }
    }

    /// Scan unsettled bets and settle each derivable match at most once.
    pub async fn run(&self) -> Result<TriggerReport, EngineError> {
        let mut report = TriggerReport::default();
        let mut groups: HashMap<(String, String), usize> = HashMap::new();

        for bet in self.bets.all().await? {
            if !bet.is_unsettled() {
                continue;
            }
            let market = self.markets.get(&bet.market_id).await.ok();
            match derive_match_identity(&bet, market.as_ref()) {
                Some(pair) => *groups.entry(pair).or_insert(0) += 1,
                None => {
                    warn!(bet_id = %bet.id, "Cannot derive match identity for bet, skipping");
                    report.underivable_bets += 1;
                }
            }
        }

        for ((sports_id, match_id), bet_count) in groups {
            if !self.registry.try_begin(&sports_id, &match_id).await {
                debug!(sports_id, match_id, "Match already attempted this process, skipping");
                report.already_attempted += 1;
                continue;
            }

            info!(sports_id, match_id, bet_count, "Auto-settlement triggered");
            match self.engine.settle_match(&sports_id, &match_id).await {
                Ok(pass) => {
                    if !pass.failed.is_empty() {
                        // Keep the match retryable until every market settles.
                        self.registry.clear(&sports_id, &match_id).await;
                    }
                    report.triggered.push((sports_id, match_id));
                }
                Err(e) => {
                    warn!(
                        sports_id,
                        match_id,
                        error = %e,
                        "Auto-settlement pass failed, clearing attempt for retry"
                    );
                    self.registry.clear(&sports_id, &match_id).await;
                    report.failed.push((sports_id, match_id));
                }
            }
        }

        Ok(report)
    }
}

/// Derive `(sports_id, match_id)` for a bet.
///
/// Fallback chain: explicit market correlation fields, then the bet's
/// metadata blob, then the sport-name lookup table, with the event id as
/// the match-id of last resort. Returns None when no chain link yields a
/// sports id.
pub fn derive_match_identity(bet: &Bet, market: Option<&Market>) -> Option<(String, String)> {
    let meta = &bet.metadata;

    let sports_id = market
        .map(|m| m.sports_id.clone())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_field(meta, &["sports_id", "sportsId", "eid"]))
        .or_else(|| {
            let sport = market.map(|m| m.key.sport.to_lowercase())?;
            SPORT_IDS
                .iter()
                .find(|(name, _)| *name == sport)
                .map(|(_, id)| id.to_string())
        })?;

    let match_id = market
        .map(|m| m.match_id.clone())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_field(meta, &["match_id", "matchId", "gmid"]))
        .or_else(|| {
            market
                .map(|m| m.key.event_id.clone())
                .filter(|s| !s.is_empty())
        })?;

    Some((sports_id, match_id))
}

/// Read the first present field from a metadata blob, accepting string
/// or numeric encodings.
fn meta_field(meta: &serde_json::Value, keys: &[&str]) -> Option<String> {
    let obj = meta.as_object()?;
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
