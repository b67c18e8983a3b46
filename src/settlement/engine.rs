//! Settlement engine.
//!
//! One pass per match: Discover → Resolve → Apply → Done.
//!
//! - Discover: every market for the match not yet `Settled`.
//! - Resolve: the result feed's outcome per market; feed timeouts are
//!   retryable failures for that market, never a void.
//! - Apply: each placed bet transitions against its frozen figures; won
//!   and void bets get exactly one wallet credit each.
//! - Done: the market is marked `Settled` only when all of its placed
//!   bets transitioned. Already-settled markets are skipped, which makes
//!   re-entrant and concurrent passes safe.
//!
//! A failure on one bet or market never aborts the pass; the report
//! carries per-market success/failure lists so a retry can target only
//! the failures.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::betting::ledger::BetStore;
use crate::feeds::{MarketOutcome, ResultFeed};
use crate::market::MarketStore;
use crate::types::{Bet, BetStatus, EngineError, Market, MarketStatus};
use crate::wallet::WalletService;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Outcome of one settlement pass over a match.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementReport {
    /// Markets settled by this pass.
    pub settled: Vec<String>,
    /// Markets that could not be settled, with reasons; retry targets.
    pub failed: Vec<FailedMarket>,
    /// Markets already settled by an earlier pass (benign no-ops).
    pub skipped: Vec<String>,
    pub bets_won: usize,
    pub bets_lost: usize,
    pub bets_void: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedMarket {
    pub market_id: String,
    pub reason: String,
}

impl SettlementReport {
    /// Whether some markets settled while others failed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.settled.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SettlementEngine {
    markets: Arc<MarketStore>,
    bets: Arc<dyn BetStore>,
    wallet: Arc<dyn WalletService>,
    results: Arc<dyn ResultFeed>,
}

impl SettlementEngine {
    pub fn new(
        markets: Arc<MarketStore>,
        bets: Arc<dyn BetStore>,
        wallet: Arc<dyn WalletService>,
        results: Arc<dyn ResultFeed>,
    ) -> Self {
        Self {
            markets,
            bets,
            wallet,
            results,
        }
    }

    /// Run one settlement pass for a match. Idempotent: a second pass
    /// over a fully settled match is a no-op that reports everything as
    /// skipped.
    pub async fn settle_match(
        &self,
        sports_id: &str,
        match_id: &str,
    ) -> Result<SettlementReport, EngineError> {
        // Feed unreachable here is retryable and aborts the pass before
        // any state change.
        if !self.results.match_completed(sports_id, match_id).await? {
            return Err(EngineError::Validation(format!(
                "Match {sports_id}/{match_id} is not completed"
            )));
        }

        let mut report = SettlementReport::default();

        let all = self.markets.all_for_match(sports_id, match_id).await;
        if all.is_empty() {
            info!(sports_id, match_id, "No markets for match, settlement pass is a no-op");
            return Ok(report);
        }

        for market in all {
            if market.status == MarketStatus::Settled {
                report.skipped.push(market.id.clone());
                continue;
            }

            match self.settle_market(&market, &mut report).await {
                Ok(()) => report.settled.push(market.id.clone()),
                Err(e) => {
                    warn!(
                        market_id = %market.id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Market settlement failed, continuing with remaining markets"
                    );
                    report.failed.push(FailedMarket {
                        market_id: market.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            sports_id,
            match_id,
            settled = report.settled.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            won = report.bets_won,
            lost = report.bets_lost,
            void = report.bets_void,
            "Settlement pass complete"
        );
        Ok(report)
    }

    /// Resolve and apply one market, then mark it settled. Any bet that
    /// fails to transition leaves the market unsettled for a later retry.
    async fn settle_market(
        &self,
        market: &Market,
        report: &mut SettlementReport,
    ) -> Result<(), EngineError> {
        let outcome = self.results.market_outcome(market).await?;

        // Close the market before touching any bet: a placement racing
        // this pass must be rejected, not silently stranded behind the
        // apply loop. A resolve failure above leaves the market as-is.
        if market.status != MarketStatus::Closed {
            self.markets
                .transition_status(&market.id, MarketStatus::Closed)
                .await?;
        }

        let bets = self.bets.all().await?;
        for bet in bets {
            if bet.market_id != market.id || !bet.is_unsettled() {
                continue;
            }
            match self.apply_bet(&bet, outcome).await {
                Ok(status) => match status {
                    BetStatus::Won => report.bets_won += 1,
                    BetStatus::Lost => report.bets_lost += 1,
                    _ => report.bets_void += 1,
                },
                Err(e) => {
                    warn!(bet_id = %bet.id, error = %e, "Bet settlement failed");
                }
            }
        }

        // The placement path checks the market status before its insert,
        // so a bet that read Open just before the close above can land
        // after our fetch. Re-check before the terminal transition: a
        // market is never settled while any of its bets is still live.
        let unsettled = self
            .bets
            .all()
            .await?
            .into_iter()
            .filter(|b| b.market_id == market.id && b.is_unsettled())
            .count();
        if unsettled > 0 {
            return Err(EngineError::Storage(format!(
                "{unsettled} bet(s) still unsettled on market {}",
                market.id
            )));
        }

        self.markets
            .transition_status(&market.id, MarketStatus::Settled)
            .await?;
        Ok(())
    }

    /// Transition one bet and apply its wallet effect. The status flips
    /// first and the credit follows; if the credit fails the bet is put
    /// back to `Placed` with no money having moved, so a later pass can
    /// retry. The reverse order can pay a winner twice: a transient
    /// update failure after the credit leaves the bet `Placed`, and the
    /// retry credits it again.
    async fn apply_bet(&self, bet: &Bet, outcome: MarketOutcome) -> Result<BetStatus, EngineError> {
        let won = match outcome {
            MarketOutcome::Void => None,
            MarketOutcome::Winner(winner) => Some(bet.side.canonical() == winner),
            MarketOutcome::Line(actual) => {
                // Session bets are judged against their own frozen rate.
                let yes_won = actual >= bet.odds_at_bet;
                Some(bet.side.is_back() == yes_won)
            }
        };

        let mut settled = bet.clone();
        settled.settled_at = Some(Utc::now());

        let payout = match won {
            Some(true) => {
                settled.status = BetStatus::Won;
                settled.profit_loss = Some(bet.potential_profit);
                Some((
                    bet.stake + bet.potential_profit,
                    format!("settle:{}:win", bet.id),
                ))
            }
            Some(false) => {
                // Stake was debited at placement; a loss has no wallet effect.
                settled.status = BetStatus::Lost;
                settled.profit_loss = Some(-bet.exposure);
                None
            }
            None => {
                settled.status = BetStatus::Void;
                settled.profit_loss = Some(Decimal::ZERO);
                Some((bet.stake, format!("settle:{}:void-refund", bet.id)))
            }
        };

        self.bets.update(settled.clone()).await?;

        if let Some((amount, reason)) = payout {
            if let Err(credit_err) = self.wallet.credit(&bet.user_id, amount, &reason).await {
                warn!(
                    bet_id = %bet.id,
                    error = %credit_err,
                    "Settlement credit failed, reverting bet for retry"
                );
                if let Err(revert_err) = self.bets.update(bet.clone()).await {
                    error!(
                        bet_id = %bet.id,
                        error = %revert_err,
                        "Bet revert failed after credit failure — wallet requires manual reconciliation"
                    );
                }
                return Err(credit_err);
            }
        }

        info!(
            bet_id = %bet.id,
            status = %settled.status,
            profit_loss = %settled.profit_loss.unwrap_or_default(),
            "Bet settled"
        );
        Ok(settled.status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
