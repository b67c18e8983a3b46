//! HTTP-backed feed clients.
//!
//! Thin reqwest wrappers around the odds and result providers. Every
//! request carries a bounded timeout; transport failures map to
//! `ProviderUnavailable` so callers can distinguish "feed unreachable,
//! retry later" from "feed returned empty".

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{MarketOutcome, OddsFeed, ResultFeed};
use crate::types::{BetSide, EngineError, Market, MarketType};

const ODDS_SOURCE: &str = "odds-feed";
const RESULT_SOURCE: &str = "result-feed";

fn provider_error(source_name: &str, err: impl std::fmt::Display) -> EngineError {
    EngineError::ProviderUnavailable {
        source_name: source_name.to_string(),
        message: err.to_string(),
    }
}

fn build_client(
    source_name: &str,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Client, EngineError> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(key) = api_key {
        let value = reqwest::header::HeaderValue::from_str(key)
            .map_err(|e| provider_error(source_name, e))?;
        headers.insert("x-api-key", value);
    }
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| provider_error(source_name, e))
}

// ---------------------------------------------------------------------------
// Odds feed
// ---------------------------------------------------------------------------

/// Odds provider client. `GET {base_url}/odds/{event_id}` returns the
/// raw payload handed to the normalizer untouched.
pub struct HttpOddsFeed {
    client: Client,
    base_url: String,
}

impl HttpOddsFeed {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            client: build_client(ODDS_SOURCE, api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OddsFeed for HttpOddsFeed {
    async fn fetch_match_odds(&self, event_id: &str) -> Result<serde_json::Value, EngineError> {
        let url = format!("{}/odds/{event_id}", self.base_url);
        debug!(%url, "Fetching match odds");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| provider_error(ODDS_SOURCE, e))?
            .error_for_status()
            .map_err(|e| provider_error(ODDS_SOURCE, e))?;

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| provider_error(ODDS_SOURCE, e))
    }
}

// ---------------------------------------------------------------------------
// Result feed
// ---------------------------------------------------------------------------

/// Wire shape of a match result document.
#[derive(Debug, Deserialize)]
struct MatchResultWire {
    #[serde(default)]
    status: String,
    /// Winning selection per market name (odds/bookmaker markets).
    #[serde(default)]
    winners: HashMap<String, String>,
    /// Realized line value per market name (session markets).
    #[serde(default)]
    lines: HashMap<String, f64>,
    /// Markets explicitly voided by the provider.
    #[serde(default)]
    voided: Vec<String>,
}

/// Result provider client.
/// `GET {base_url}/result/{sports_id}/{match_id}` returns the match
/// result document described by [`MatchResultWire`].
pub struct HttpResultFeed {
    client: Client,
    base_url: String,
}

impl HttpResultFeed {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            client: build_client(RESULT_SOURCE, api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, sports_id: &str, match_id: &str) -> Result<MatchResultWire, EngineError> {
        let url = format!("{}/result/{sports_id}/{match_id}", self.base_url);
        debug!(%url, "Fetching match result");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| provider_error(RESULT_SOURCE, e))?
            .error_for_status()
            .map_err(|e| provider_error(RESULT_SOURCE, e))?;

        resp.json::<MatchResultWire>()
            .await
            .map_err(|e| provider_error(RESULT_SOURCE, e))
    }
}

#[async_trait]
impl ResultFeed for HttpResultFeed {
    async fn match_completed(
        &self,
        sports_id: &str,
        match_id: &str,
    ) -> Result<bool, EngineError> {
        let result = self.fetch(sports_id, match_id).await?;
        Ok(result.status.eq_ignore_ascii_case("completed"))
    }

    async fn market_outcome(&self, market: &Market) -> Result<MarketOutcome, EngineError> {
        let result = self.fetch(&market.sports_id, &market.match_id).await?;
        Ok(outcome_from_result(&result, market))
    }
}

/// Map a result document onto one market. Markets the provider voided,
/// and markets the document simply has no entry for, resolve to `Void`.
fn outcome_from_result(result: &MatchResultWire, market: &Market) -> MarketOutcome {
    let name = &market.key.market_name;
    if result.voided.iter().any(|v| v == name) {
        return MarketOutcome::Void;
    }

    match market.key.market_type {
        MarketType::Session => match result.lines.get(name).copied().and_then(Decimal::from_f64)
        {
            Some(actual) => MarketOutcome::Line(actual),
            None => MarketOutcome::Void,
        },
        _ => match result.winners.get(name) {
            Some(winning_selection) => {
                if winning_selection.eq_ignore_ascii_case(&market.key.selection) {
                    MarketOutcome::Winner(BetSide::Back)
                } else {
                    MarketOutcome::Winner(BetSide::Lay)
                }
            }
            None => MarketOutcome::Void,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn market(market_type: MarketType, name: &str, selection: &str) -> Market {
        Market {
            id: "mkt-1".to_string(),
            key: crate::types::MarketKey {
                event_id: "evt-1".to_string(),
                sport: "cricket".to_string(),
                market_name: name.to_string(),
                market_type,
                selection: selection.to_string(),
            },
            odds_back: dec!(2.5),
            odds_lay: dec!(2.52),
            rate_yes: Decimal::ZERO,
            rate_no: Decimal::ZERO,
            current_line: Decimal::ZERO,
            status: crate::types::MarketStatus::Open,
            sports_id: "4".to_string(),
            match_id: "m-1".to_string(),
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    fn result_doc() -> MatchResultWire {
        serde_json::from_value(serde_json::json!({
            "status": "completed",
            "winners": { "Match Odds": "India" },
            "lines": { "6 Over Runs": 52.0 },
            "voided": ["Rain Affected Market"],
        }))
        .unwrap()
    }

    #[test]
    fn test_winner_back_when_selection_won() {
        let outcome = outcome_from_result(&result_doc(), &market(MarketType::Odds, "Match Odds", "India"));
        assert_eq!(outcome, MarketOutcome::Winner(BetSide::Back));
    }

    #[test]
    fn test_winner_lay_when_selection_lost() {
        let outcome =
            outcome_from_result(&result_doc(), &market(MarketType::Odds, "Match Odds", "Australia"));
        assert_eq!(outcome, MarketOutcome::Winner(BetSide::Lay));
    }

    #[test]
    fn test_session_line() {
        let outcome =
            outcome_from_result(&result_doc(), &market(MarketType::Session, "6 Over Runs", "6 Over Runs"));
        assert_eq!(outcome, MarketOutcome::Line(dec!(52)));
    }

    #[test]
    fn test_voided_market() {
        let outcome = outcome_from_result(
            &result_doc(),
            &market(MarketType::Odds, "Rain Affected Market", "India"),
        );
        assert_eq!(outcome, MarketOutcome::Void);
    }

    #[test]
    fn test_missing_market_resolves_void() {
        let outcome =
            outcome_from_result(&result_doc(), &market(MarketType::Odds, "Unknown Market", "India"));
        assert_eq!(outcome, MarketOutcome::Void);

        let outcome = outcome_from_result(
            &result_doc(),
            &market(MarketType::Session, "Unknown Session", "Unknown Session"),
        );
        assert_eq!(outcome, MarketOutcome::Void);
    }

    #[test]
    fn test_wire_defaults_tolerate_sparse_documents() {
        let sparse: MatchResultWire = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!sparse.status.eq_ignore_ascii_case("completed"));
        assert!(sparse.winners.is_empty());
    }
}
