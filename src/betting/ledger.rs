//! Bet ledger — transactional bet placement and bet queries.
//!
//! Placement order is fixed: debit the wallet first, then insert the bet,
//! and compensate the debit if the insert fails. That sequence is the only
//! one that can neither lose a stake nor leave a bet uncharged.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::betting::calculator;
use crate::market::MarketStore;
use crate::types::{Bet, BetSide, BetStatus, EngineError, Market};
use crate::wallet::WalletService;

// ---------------------------------------------------------------------------
// Bet store seam
// ---------------------------------------------------------------------------

/// Persistence seam for bets. The in-memory implementation below is the
/// default; tests inject faulty stores to exercise the compensation path.
#[async_trait]
pub trait BetStore: Send + Sync {
    async fn insert(&self, bet: Bet) -> Result<(), EngineError>;
    async fn update(&self, bet: Bet) -> Result<(), EngineError>;
    async fn get(&self, bet_id: &str) -> Result<Bet, EngineError>;
    async fn all(&self) -> Result<Vec<Bet>, EngineError>;
}

/// In-memory bet store guarded by a single lock.
#[derive(Default)]
pub struct MemoryBetStore {
    bets: Mutex<HashMap<String, Bet>>,
}

impl MemoryBetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all bets from a persisted snapshot.
    pub async fn restore(&self, bets: Vec<Bet>) {
        let mut guard = self.bets.lock().await;
        guard.clear();
        for bet in bets {
            guard.insert(bet.id.clone(), bet);
        }
    }
}

#[async_trait]
impl BetStore for MemoryBetStore {
    async fn insert(&self, bet: Bet) -> Result<(), EngineError> {
        let mut bets = self.bets.lock().await;
        if bets.contains_key(&bet.id) {
            return Err(EngineError::Storage(format!("Duplicate bet id: {}", bet.id)));
        }
        bets.insert(bet.id.clone(), bet);
        Ok(())
    }

    async fn update(&self, bet: Bet) -> Result<(), EngineError> {
        let mut bets = self.bets.lock().await;
        if !bets.contains_key(&bet.id) {
            return Err(EngineError::BetNotFound(bet.id.clone()));
        }
        bets.insert(bet.id.clone(), bet);
        Ok(())
    }

    async fn get(&self, bet_id: &str) -> Result<Bet, EngineError> {
        self.bets
            .lock()
            .await
            .get(bet_id)
            .cloned()
            .ok_or_else(|| EngineError::BetNotFound(bet_id.to_string()))
    }

    async fn all(&self) -> Result<Vec<Bet>, EngineError> {
        let mut bets: Vec<Bet> = self.bets.lock().await.values().cloned().collect();
        bets.sort_by_key(|b| b.placed_at);
        Ok(bets)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Owns bet placement and bet queries.
pub struct BetLedger {
    markets: Arc<MarketStore>,
    wallet: Arc<dyn WalletService>,
    store: Arc<dyn BetStore>,
}

impl BetLedger {
    pub fn new(
        markets: Arc<MarketStore>,
        wallet: Arc<dyn WalletService>,
        store: Arc<dyn BetStore>,
    ) -> Self {
        Self {
            markets,
            wallet,
            store,
        }
    }

    /// Place a bet against an existing market.
    ///
    /// The market's persisted odds are authoritative; any price the caller
    /// saw on screen is ignored, which closes the stale-quote window.
    /// Exactly one wallet debit and one bet row on success; zero net
    /// wallet effect on every failure path.
    pub async fn place_bet(
        &self,
        user_id: &str,
        market_id: &str,
        side: BetSide,
        stake: Decimal,
        metadata: serde_json::Value,
    ) -> Result<Bet, EngineError> {
        let market = self.markets.get(market_id).await?;
        if !market.is_open() {
            return Err(EngineError::MarketNotOpen(market.status));
        }

        let price = market.price_for(side);
        let figures = calculator::figures(market.key.market_type, side, stake, price)?;

        let bet_id = Uuid::new_v4().to_string();
        let debit_reason = format!("bet:{bet_id}:stake");
        self.wallet.debit(user_id, stake, &debit_reason).await?;

        let bet = Bet {
            id: bet_id.clone(),
            user_id: user_id.to_string(),
            market_id: market.id.clone(),
            side,
            stake,
            odds_at_bet: price,
            selection_at_bet: market.key.selection.clone(),
            exposure: figures.exposure,
            potential_profit: figures.potential_profit,
            status: BetStatus::Placed,
            profit_loss: None,
            metadata,
            placed_at: Utc::now(),
            settled_at: None,
        };

        if let Err(insert_err) = self.store.insert(bet.clone()).await {
            // The stake is already gone from the wallet; reverse it before
            // surfacing the failure.
            warn!(bet_id = %bet_id, error = %insert_err, "Bet insert failed, reversing debit");
            let refund_reason = format!("bet:{bet_id}:placement-reversal");
            if let Err(credit_err) = self.wallet.credit(user_id, stake, &refund_reason).await {
                error!(
                    bet_id = %bet_id,
                    error = %credit_err,
                    "Compensating credit failed — wallet requires manual reconciliation"
                );
            }
            return Err(insert_err);
        }

        info!(
            bet_id = %bet_id,
            user_id,
            market_id = %market.id,
            side = %side,
            stake = %stake,
            price = %price,
            "Bet placed"
        );
        Ok(bet)
    }

    /// Bets for a user, newest-last, optionally restricted to one match.
    pub async fn list_bets(
        &self,
        user_id: &str,
        match_id: Option<&str>,
    ) -> Result<Vec<Bet>, EngineError> {
        let bets = self.store.all().await?;
        let mut out = Vec::new();
        for bet in bets {
            if bet.user_id != user_id {
                continue;
            }
            if let Some(mid) = match_id {
                let market = self.markets.get(&bet.market_id).await?;
                if market.match_id != mid {
                    continue;
                }
            }
            out.push(bet);
        }
        Ok(out)
    }

    /// The market a bet was placed against.
    pub async fn market_for(&self, bet: &Bet) -> Result<Market, EngineError> {
        self.markets.get(&bet.market_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
