//! Market store — owns `Market` entities.
//!
//! Provides the atomic get-or-create used by the bet placement path and
//! enforces forward-only status transitions. All mutations happen under
//! one lock, so concurrent first-bettors on the same key converge on a
//! single market row.

pub mod classify;

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{EngineError, Market, MarketKey, MarketStatus};

/// Odds observed by the caller at creation time. Used to seed a brand-new
/// market row; an existing row keeps its persisted prices.
#[derive(Debug, Clone, Default)]
pub struct ObservedOdds {
    pub odds_back: Decimal,
    pub odds_lay: Decimal,
    pub rate_yes: Decimal,
    pub rate_no: Decimal,
    pub current_line: Decimal,
}

#[derive(Default)]
struct MarketStoreInner {
    by_key: HashMap<MarketKey, String>,
    markets: HashMap<String, Market>,
}

/// In-memory market store. The single `Mutex` is the transactional
/// boundary: insert-if-absent and status transitions are atomic, and no
/// lock is ever held across a provider call.
#[derive(Default)]
pub struct MarketStore {
    inner: Mutex<MarketStoreInner>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic insert-if-absent. Returns the persisted market — existing
    /// callers always price against the authoritative row, not their own
    /// observed odds.
    pub async fn get_or_create(
        &self,
        key: MarketKey,
        sports_id: &str,
        match_id: &str,
        observed: ObservedOdds,
    ) -> Result<Market, EngineError> {
        let mut inner = self.inner.lock().await;

        if let Some(id) = inner.by_key.get(&key) {
            let market = inner
                .markets
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::Storage(format!("Dangling market key index: {id}")))?;
            debug!(market_id = %market.id, key = %key, "Market exists, returning persisted row");
            return Ok(market);
        }

        let market = Market {
            id: Uuid::new_v4().to_string(),
            key: key.clone(),
            odds_back: observed.odds_back,
            odds_lay: observed.odds_lay,
            rate_yes: observed.rate_yes,
            rate_no: observed.rate_no,
            current_line: observed.current_line,
            status: MarketStatus::Open,
            sports_id: sports_id.to_string(),
            match_id: match_id.to_string(),
            created_at: Utc::now(),
            settled_at: None,
        };

        info!(market_id = %market.id, key = %key, "Market created");
        inner.by_key.insert(key, market.id.clone());
        inner.markets.insert(market.id.clone(), market.clone());
        Ok(market)
    }

    /// Fetch a market by id.
    pub async fn get(&self, market_id: &str) -> Result<Market, EngineError> {
        self.inner
            .lock()
            .await
            .markets
            .get(market_id)
            .cloned()
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))
    }

    /// Forward-only status transition:
    /// `Open ⇄ Suspended`, `Open|Suspended → Closed`, `Closed → Settled`.
    /// Leaving `Settled` is always rejected.
    pub async fn transition_status(
        &self,
        market_id: &str,
        new_status: MarketStatus,
    ) -> Result<Market, EngineError> {
        let mut inner = self.inner.lock().await;
        let market = inner
            .markets
            .get_mut(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;

        let allowed = matches!(
            (market.status, new_status),
            (MarketStatus::Open, MarketStatus::Suspended)
                | (MarketStatus::Suspended, MarketStatus::Open)
                | (MarketStatus::Open, MarketStatus::Closed)
                | (MarketStatus::Suspended, MarketStatus::Closed)
                | (MarketStatus::Closed, MarketStatus::Settled)
        );

        if !allowed {
            if market.status == MarketStatus::Settled {
                return Err(EngineError::AlreadySettled(market_id.to_string()));
            }
            return Err(EngineError::Validation(format!(
                "Illegal market transition {} -> {}",
                market.status, new_status
            )));
        }

        market.status = new_status;
        if new_status == MarketStatus::Settled {
            market.settled_at = Some(Utc::now());
        }
        info!(market_id, status = %new_status, "Market status transitioned");
        Ok(market.clone())
    }

    /// Refresh live prices from the feed. Touches the market row only;
    /// frozen per-bet prices are unaffected by design of the data model.
    pub async fn update_odds(
        &self,
        market_id: &str,
        observed: ObservedOdds,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        let market = inner
            .markets
            .get_mut(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;

        market.odds_back = observed.odds_back;
        market.odds_lay = observed.odds_lay;
        market.rate_yes = observed.rate_yes;
        market.rate_no = observed.rate_no;
        market.current_line = observed.current_line;
        Ok(())
    }

    /// All markets for a match that have not yet been settled.
    pub async fn unsettled_for_match(&self, sports_id: &str, match_id: &str) -> Vec<Market> {
        self.inner
            .lock()
            .await
            .markets
            .values()
            .filter(|m| {
                m.sports_id == sports_id
                    && m.match_id == match_id
                    && m.status != MarketStatus::Settled
            })
            .cloned()
            .collect()
    }

    /// All markets for a match, settled or not.
    pub async fn all_for_match(&self, sports_id: &str, match_id: &str) -> Vec<Market> {
        self.inner
            .lock()
            .await
            .markets
            .values()
            .filter(|m| m.sports_id == sports_id && m.match_id == match_id)
            .cloned()
            .collect()
    }

    /// Snapshot of every market, for persistence.
    pub async fn snapshot(&self) -> Vec<Market> {
        self.inner.lock().await.markets.values().cloned().collect()
    }

    /// Restore markets from a persisted snapshot. Existing state is replaced.
    pub async fn restore(&self, markets: Vec<Market>) {
        let mut inner = self.inner.lock().await;
        inner.by_key.clear();
        inner.markets.clear();
        for market in markets {
            inner.by_key.insert(market.key.clone(), market.id.clone());
            inner.markets.insert(market.id.clone(), market);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
