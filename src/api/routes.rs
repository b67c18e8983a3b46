//! API route handlers.
//!
//! All endpoints return JSON. Shared state is `Arc<ApiState>`. Domain
//! errors map onto specific status codes so a rejected bet comes back
//! with its concrete reason (insufficient funds vs market closed vs
//! invalid amount), never a generic failure.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::betting::calculator::{self, BetFigures};
use crate::betting::ledger::BetLedger;
use crate::feeds::{normalize, OddsFeed};
use crate::market::{classify, MarketStore, ObservedOdds};
use crate::settlement::engine::{SettlementEngine, SettlementReport};
use crate::types::{Bet, BetSide, EngineError, MarketKey, MarketType, OddsSnapshot};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub markets: Arc<MarketStore>,
    pub ledger: Arc<BetLedger>,
    pub engine: Arc<SettlementEngine>,
    pub odds: Arc<dyn OddsFeed>,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub market_type: MarketType,
    pub side: BetSide,
    pub stake: Decimal,
    pub odds: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub event_id: String,
    pub sport: String,
    pub market_name: String,
    /// Explicit type tag if the caller's feed supplied one.
    #[serde(default)]
    pub market_type: Option<MarketType>,
    pub selection: String,
    pub side: BetSide,
    pub stake: Decimal,
    /// Odds the caller observed; used only to seed a brand-new market.
    #[serde(default)]
    pub observed_odds: Decimal,
    #[serde(default)]
    pub sports_id: String,
    #[serde(default)]
    pub match_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ListBetsQuery {
    pub user_id: String,
    #[serde(default)]
    pub match_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(e: EngineError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        EngineError::MarketNotOpen(_) | EngineError::AlreadySettled(_) => StatusCode::CONFLICT,
        EngineError::MarketNotFound(_) | EngineError::BetNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: e.to_string() }))
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `POST /api/preview` — pure figures, no side effects.
pub async fn preview_bet(Json(req): Json<PreviewRequest>) -> ApiResult<BetFigures> {
    calculator::figures(req.market_type, req.side, req.stake, req.odds)
        .map(Json)
        .map_err(error_response)
}

/// `POST /api/bets` — get-or-create the market, then place the bet
/// against its authoritative odds.
pub async fn place_bet(
    State(state): State<AppState>,
    Json(req): Json<PlaceBetRequest>,
) -> ApiResult<Bet> {
    let market_type = req
        .market_type
        .unwrap_or_else(|| classify::classify(None, &req.market_name, req.observed_odds));

    let key = MarketKey {
        event_id: req.event_id.clone(),
        sport: req.sport.clone(),
        market_name: req.market_name.clone(),
        market_type,
        selection: req.selection.clone(),
    };

    let observed = match market_type {
        MarketType::Session => ObservedOdds {
            rate_yes: req.observed_odds,
            rate_no: req.observed_odds,
            ..Default::default()
        },
        _ => ObservedOdds {
            odds_back: req.observed_odds,
            odds_lay: req.observed_odds,
            ..Default::default()
        },
    };

    let market = state
        .markets
        .get_or_create(key, &req.sports_id, &req.match_id, observed)
        .await
        .map_err(error_response)?;

    state
        .ledger
        .place_bet(&req.user_id, &market.id, req.side, req.stake, req.metadata)
        .await
        .map(Json)
        .map_err(error_response)
}

/// `GET /api/bets?user_id=...&match_id=...`
pub async fn list_bets(
    State(state): State<AppState>,
    Query(query): Query<ListBetsQuery>,
) -> ApiResult<Vec<Bet>> {
    state
        .ledger
        .list_bets(&query.user_id, query.match_id.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}

/// `POST /api/settle/:sports_id/:match_id` — operator settlement path.
/// Partial failure is a 200 with per-market detail; the caller retries
/// only the failed subset.
pub async fn settle_match(
    State(state): State<AppState>,
    Path((sports_id, match_id)): Path<(String, String)>,
) -> ApiResult<SettlementReport> {
    state
        .engine
        .settle_match(&sports_id, &match_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// `GET /api/markets/:event_id` — normalized ladders straight from the
/// odds feed. An empty list means "no markets available"; a provider
/// failure surfaces as 503 so callers can retry.
pub async fn event_markets(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Vec<OddsSnapshot>> {
    let raw = state
        .odds
        .fetch_match_odds(&event_id)
        .await
        .map_err(error_response)?;
    Ok(Json(normalize::normalize(&raw)))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
