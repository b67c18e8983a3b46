//! Betting — payout mathematics and the transactional bet ledger.

pub mod calculator;
pub mod ledger;
