//! Bet calculator — pure payout and liability mathematics.
//!
//! Three payout algebras:
//! - `odds`: standard decimal-odds exchange algebra.
//! - `bookmaker`: odds quoted as a points value, profit at 1% per point.
//! - `session`: rate quoted as a total-return figure, not a multiplier;
//!   yes-side profit is the excess of that return over the stake, and the
//!   no side's liability is the same excess.
//!
//! All functions are deterministic and side-effect free. Invalid inputs
//! (stake or price <= 0) are rejected before any caller state changes.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{BetSide, EngineError, MarketType};

/// Profit and liability figures for a prospective bet.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BetFigures {
    /// What the bettor wins if the bet succeeds.
    pub potential_profit: Decimal,
    /// Maximum amount the bet can cost its holder.
    pub exposure: Decimal,
}

/// Compute profit/liability for `(market_type, side, stake, price)`.
///
/// `price` is decimal odds for `odds` markets, a points value for
/// `bookmaker` markets, and a total-return rate for `session` markets.
pub fn figures(
    market_type: MarketType,
    side: BetSide,
    stake: Decimal,
    price: Decimal,
) -> Result<BetFigures, EngineError> {
    if stake <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "Stake must be positive, got {stake}"
        )));
    }
    if price <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "Odds/rate must be positive, got {price}"
        )));
    }

    let figures = match (market_type, side.canonical()) {
        (MarketType::Odds, BetSide::Back) => BetFigures {
            potential_profit: stake * (price - Decimal::ONE),
            exposure: stake,
        },
        (MarketType::Odds, _) => BetFigures {
            potential_profit: stake,
            exposure: stake * (price - Decimal::ONE).max(Decimal::ZERO),
        },
        (MarketType::Bookmaker, BetSide::Back) => BetFigures {
            potential_profit: stake * price / dec!(100),
            exposure: stake,
        },
        (MarketType::Bookmaker, _) => BetFigures {
            potential_profit: stake,
            exposure: stake * price / dec!(100),
        },
        (MarketType::Session, BetSide::Back) => BetFigures {
            potential_profit: (price - stake).max(Decimal::ZERO),
            exposure: stake,
        },
        (MarketType::Session, _) => BetFigures {
            potential_profit: stake,
            exposure: (price - stake).max(Decimal::ZERO),
        },
    };

    Ok(figures)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
