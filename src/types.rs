//! Shared types for the wagermill engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that feed, market, betting,
//! and settlement modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Payout algebra a market settles under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    /// Standard decimal-odds exchange market (match odds, tied match, ...).
    Odds,
    /// Bookmaker market: odds quoted as points, profit scales at 1% per point.
    Bookmaker,
    /// Session / fancy line market: rate quoted as a total-return figure.
    Session,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Odds => write!(f, "odds"),
            MarketType::Bookmaker => write!(f, "bookmaker"),
            MarketType::Session => write!(f, "session"),
        }
    }
}

impl std::str::FromStr for MarketType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "odds" | "match_odds" => Ok(MarketType::Odds),
            "bookmaker" | "bm" => Ok(MarketType::Bookmaker),
            "session" | "fancy" | "line" => Ok(MarketType::Session),
            _ => Err(EngineError::Validation(format!("Unknown market type: {s}"))),
        }
    }
}

/// Market lifecycle status. Transitions are forward-only and enforced
/// by the `MarketStore` (a settled market never leaves `Settled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Suspended,
    Closed,
    Settled,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "open"),
            MarketStatus::Suspended => write!(f, "suspended"),
            MarketStatus::Closed => write!(f, "closed"),
            MarketStatus::Settled => write!(f, "settled"),
        }
    }
}

/// Bet direction. `Yes`/`No` are the session-market aliases of
/// `Back`/`Lay`; everything downstream of placement works on the
/// canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetSide {
    Back,
    Lay,
    Yes,
    No,
}

impl BetSide {
    /// Canonical form: `Yes` → `Back`, `No` → `Lay`.
    pub fn canonical(&self) -> BetSide {
        match self {
            BetSide::Yes => BetSide::Back,
            BetSide::No => BetSide::Lay,
            other => *other,
        }
    }

    /// Whether this side wins when the backed outcome occurs.
    pub fn is_back(&self) -> bool {
        matches!(self.canonical(), BetSide::Back)
    }
}

impl fmt::Display for BetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetSide::Back => write!(f, "BACK"),
            BetSide::Lay => write!(f, "LAY"),
            BetSide::Yes => write!(f, "YES"),
            BetSide::No => write!(f, "NO"),
        }
    }
}

impl std::str::FromStr for BetSide {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "back" => Ok(BetSide::Back),
            "lay" => Ok(BetSide::Lay),
            "yes" => Ok(BetSide::Yes),
            "no" => Ok(BetSide::No),
            _ => Err(EngineError::Validation(format!("Unknown bet side: {s}"))),
        }
    }
}

/// Bet lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Placed,
    Won,
    Lost,
    Void,
    Refunded,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Placed => write!(f, "placed"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Void => write!(f, "void"),
            BetStatus::Refunded => write!(f, "refunded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Unique identity of a market. Concurrent first-bettors on the same key
/// must converge on a single persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub event_id: String,
    pub sport: String,
    pub market_name: String,
    pub market_type: MarketType,
    pub selection: String,
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.event_id, self.sport, self.market_name, self.market_type, self.selection,
        )
    }
}

/// A bettable market. Created lazily on the first bet against its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub key: MarketKey,
    /// Live back odds (odds/bookmaker markets).
    pub odds_back: Decimal,
    /// Live lay odds (odds/bookmaker markets).
    pub odds_lay: Decimal,
    /// Live yes rate (session markets).
    pub rate_yes: Decimal,
    /// Live no rate (session markets).
    pub rate_no: Decimal,
    /// Current line for session markets (e.g. total runs).
    pub current_line: Decimal,
    pub status: MarketStatus,
    /// Upstream correlation: sport id in the result feed.
    pub sports_id: String,
    /// Upstream correlation: match id in the result feed.
    pub match_id: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) back={} lay={} status={}",
            self.key.market_type,
            self.key.market_name,
            self.key.selection,
            self.odds_back,
            self.odds_lay,
            self.status,
        )
    }
}

impl Market {
    /// The authoritative price for a bet on `side`, per market type.
    /// Session markets quote per-side rates; the others quote back/lay odds.
    pub fn price_for(&self, side: BetSide) -> Decimal {
        match (self.key.market_type, side.canonical()) {
            (MarketType::Session, BetSide::Back) => self.rate_yes,
            (MarketType::Session, _) => self.rate_no,
            (_, BetSide::Back) => self.odds_back,
            (_, _) => self.odds_lay,
        }
    }

    /// Whether new bets are accepted.
    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A placed bet. `odds_at_bet`, `exposure`, and `potential_profit` are
/// frozen at placement; settlement reads these, never the market's
/// live prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: String,
    pub market_id: String,
    /// Side as the bettor expressed it (yes/no preserved for display).
    pub side: BetSide,
    pub stake: Decimal,
    /// Price frozen at placement: decimal odds, bookmaker points, or
    /// session rate depending on the market type.
    pub odds_at_bet: Decimal,
    pub selection_at_bet: String,
    /// Maximum amount this bet can cost its holder.
    pub exposure: Decimal,
    pub potential_profit: Decimal,
    pub status: BetStatus,
    /// Realized profit/loss; None until settled.
    pub profit_loss: Option<Decimal>,
    /// Opaque upstream metadata carried for settlement correlation.
    pub metadata: serde_json::Value,
    pub placed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} stake={} @ {} (profit={} liability={}) [{}]",
            self.id,
            self.side,
            self.selection_at_bet,
            self.stake,
            self.odds_at_bet,
            self.potential_profit,
            self.exposure,
            self.status,
        )
    }
}

impl Bet {
    /// Whether this bet is still awaiting settlement.
    pub fn is_unsettled(&self) -> bool {
        self.status == BetStatus::Placed
    }
}

// ---------------------------------------------------------------------------
// Odds snapshot (ephemeral)
// ---------------------------------------------------------------------------

/// One rung of an odds ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSize {
    pub odds: Decimal,
    pub size: Decimal,
}

/// Normalized ladder for one selection. Display-only: not authoritative
/// once a bet has been placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub selection: String,
    /// Provider status string, passed through verbatim ("ACTIVE",
    /// "SUSPENDED", ...). Empty if the provider omitted it.
    pub status: String,
    /// Best-first back prices, at most three.
    pub back: Vec<PriceSize>,
    /// Best-first lay prices, at most three.
    pub lay: Vec<PriceSize>,
}

impl OddsSnapshot {
    pub fn best_back(&self) -> Option<&PriceSize> {
        self.back.first()
    }

    pub fn best_lay(&self) -> Option<&PriceSize> {
        self.lay.first()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Market not open for betting (status: {0})")]
    MarketNotOpen(MarketStatus),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Bet not found: {0}")]
    BetNotFound(String),

    #[error("Provider unavailable ({source_name}): {message}")]
    ProviderUnavailable { source_name: String, message: String },

    #[error("Market already settled: {0}")]
    AlreadySettled(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Whether the caller should retry later rather than treat the
    /// condition as terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ProviderUnavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
