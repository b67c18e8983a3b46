//! Market-type classification from upstream market metadata.
//!
//! Precedence: an explicit type tag from the feed always wins, then a
//! bookmaker designation, then known name patterns. Only when all of
//! those miss do we fall back to the numeric-rate heuristic, which is a
//! known soft edge: a genuine decimal-odds market quoted above 100 would
//! be misclassified, so the fallback is logged rather than trusted
//! silently.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::types::MarketType;

/// Name fragments that identify decimal-odds exchange markets.
const ODDS_PATTERNS: &[&str] = &[
    "match odds",
    "match_odds",
    "tied match",
    "to win the toss",
    "completed match",
    "winner",
    "moneyline",
];

/// Name fragments that identify session / fancy line markets.
const SESSION_PATTERNS: &[&str] = &[
    "session",
    "fancy",
    "over",
    "innings",
    "run",
    "wicket",
    "wkt",
    "ball",
    "boundaries",
    "total",
    "line",
];

/// Classify a market from its feed metadata.
///
/// `type_tag` is the explicit tag if the feed supplied one, `market_name`
/// the display name, and `rate` a representative quoted price used only
/// by the last-resort heuristic.
pub fn classify(type_tag: Option<&str>, market_name: &str, rate: Decimal) -> MarketType {
    if let Some(tag) = type_tag {
        if let Ok(mt) = tag.parse::<MarketType>() {
            return mt;
        }
        warn!(tag, market_name, "Unrecognized market type tag, classifying by name");
    }

    let name = market_name.to_lowercase();

    if name.contains("bookmaker") || name.contains("book maker") {
        return MarketType::Bookmaker;
    }
    if ODDS_PATTERNS.iter().any(|p| name.contains(p)) {
        return MarketType::Odds;
    }
    if SESSION_PATTERNS.iter().any(|p| name.contains(p)) {
        return MarketType::Session;
    }

    // Last resort: session rates are quoted as total-return figures and
    // sit well above decimal odds. High-odds outliers can be misclassified
    // here, so the decision is logged.
    let fallback = if rate > dec!(100) {
        MarketType::Session
    } else {
        MarketType::Odds
    };
    warn!(
        market_name,
        %rate,
        classified = %fallback,
        "Market type unresolved by tag or name, using rate heuristic"
    );
    fallback
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
