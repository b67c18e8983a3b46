//! Feed integrations.
//!
//! Defines the `OddsFeed` and `ResultFeed` traits and the canonical
//! outcome type settlement works from. HTTP-backed implementations live
//! in `http`; payload normalization in `normalize`.
//!
//! Feed failures are always surfaced as `ProviderUnavailable` (retryable),
//! never silently collapsed into "no markets" or "no result".

pub mod http;
pub mod normalize;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{BetSide, EngineError, Market};

/// Resolved outcome for one market, as reported by the result feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarketOutcome {
    /// The winning side, canonical `Back` or `Lay`.
    Winner(BetSide),
    /// Realized line value for a session market; each bet is judged
    /// against its own frozen rate.
    Line(Decimal),
    /// Market could not be resolved — all its bets are voided.
    Void,
}

/// Source of raw per-match odds payloads.
#[async_trait]
pub trait OddsFeed: Send + Sync {
    /// Fetch the raw odds payload for an event. The shape is
    /// provider-specific; callers normalize via [`normalize::normalize`].
    async fn fetch_match_odds(&self, event_id: &str) -> Result<serde_json::Value, EngineError>;
}

/// Source of authoritative match results.
#[async_trait]
pub trait ResultFeed: Send + Sync {
    /// Whether the match has finished.
    async fn match_completed(&self, sports_id: &str, match_id: &str)
        -> Result<bool, EngineError>;

    /// The realized outcome for one market of a finished match.
    async fn market_outcome(&self, market: &Market) -> Result<MarketOutcome, EngineError>;
}
