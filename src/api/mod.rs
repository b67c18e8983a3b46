//! API — Axum web server for bet placement and settlement operations.
//!
//! Serves a REST API over the market store, bet ledger, and settlement
//! engine. CORS enabled for local development.

pub mod routes;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Start the API web server.
///
/// This spawns a background task — it doesn't block.
pub fn spawn_api(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!(port, "API server starting on http://localhost:{port}");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind API port");

        axum::serve(listener, app).await.expect("API server error");
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/bets", post(routes::place_bet).get(routes::list_bets))
        .route("/api/preview", post(routes::preview_bet))
        .route(
            "/api/settle/:sports_id/:match_id",
            post(routes::settle_match),
        )
        .route("/api/markets/:event_id", get(routes::event_markets))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::ledger::{BetLedger, MemoryBetStore};
    use crate::feeds::{MarketOutcome, OddsFeed, ResultFeed};
    use crate::market::MarketStore;
    use crate::settlement::engine::SettlementEngine;
    use crate::types::{EngineError, Market};
    use crate::wallet::MemoryWallet;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use routes::ApiState;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct CannedOddsFeed {
        payload: serde_json::Value,
    }

    #[async_trait]
    impl OddsFeed for CannedOddsFeed {
        async fn fetch_match_odds(&self, _event_id: &str) -> Result<serde_json::Value, EngineError> {
            Ok(self.payload.clone())
        }
    }

    struct UnreachableOddsFeed;

    #[async_trait]
    impl OddsFeed for UnreachableOddsFeed {
        async fn fetch_match_odds(&self, _event_id: &str) -> Result<serde_json::Value, EngineError> {
            Err(EngineError::ProviderUnavailable {
                source_name: "odds".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct NeverDoneResultFeed;

    #[async_trait]
    impl ResultFeed for NeverDoneResultFeed {
        async fn match_completed(&self, _: &str, _: &str) -> Result<bool, EngineError> {
            Ok(false)
        }
        async fn market_outcome(&self, _: &Market) -> Result<MarketOutcome, EngineError> {
            Ok(MarketOutcome::Void)
        }
    }

    fn test_state(odds: Arc<dyn OddsFeed>) -> AppState {
        let markets = Arc::new(MarketStore::new());
        let store = Arc::new(MemoryBetStore::new());
        let wallet = Arc::new(MemoryWallet::new(dec!(1000)));
        let ledger = Arc::new(BetLedger::new(markets.clone(), wallet.clone(), store.clone()));
        let engine = Arc::new(SettlementEngine::new(
            markets.clone(),
            store,
            wallet,
            Arc::new(NeverDoneResultFeed),
        ));
        Arc::new(ApiState {
            markets,
            ledger,
            engine,
            odds,
        })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state(Arc::new(UnreachableOddsFeed)));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_preview_endpoint() {
        let app = build_router(test_state(Arc::new(UnreachableOddsFeed)));
        let resp = app
            .oneshot(post_json(
                "/api/preview",
                json!({ "market_type": "odds", "side": "back", "stake": 100, "odds": 2.5 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let figures: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(figures["potential_profit"].as_f64().unwrap(), 150.0);
        assert_eq!(figures["exposure"].as_f64().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_preview_invalid_stake_is_400() {
        let app = build_router(test_state(Arc::new(UnreachableOddsFeed)));
        let resp = app
            .oneshot(post_json(
                "/api/preview",
                json!({ "market_type": "odds", "side": "back", "stake": 0, "odds": 2.5 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_place_and_list_bets() {
        let state = test_state(Arc::new(UnreachableOddsFeed));
        let app = build_router(state.clone());

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/bets",
                json!({
                    "user_id": "u1",
                    "event_id": "evt-1",
                    "sport": "cricket",
                    "market_name": "Match Odds",
                    "selection": "India",
                    "side": "back",
                    "stake": 100,
                    "observed_odds": 2.5,
                    "sports_id": "4",
                    "match_id": "m-1"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let bet: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(bet["status"], "placed");
        assert_eq!(bet["odds_at_bet"].as_f64().unwrap(), 2.5);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/bets?user_id=u1&match_id=m-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let bets: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(bets.len(), 1);
    }

    #[tokio::test]
    async fn test_place_bet_insufficient_funds_is_402() {
        let state = test_state(Arc::new(UnreachableOddsFeed));
        let app = build_router(state);
        let resp = app
            .oneshot(post_json(
                "/api/bets",
                json!({
                    "user_id": "u1",
                    "event_id": "evt-1",
                    "sport": "cricket",
                    "market_name": "Match Odds",
                    "selection": "India",
                    "side": "back",
                    "stake": 5000,
                    "observed_odds": 2.5
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn test_settle_incomplete_match_is_400() {
        let app = build_router(test_state(Arc::new(UnreachableOddsFeed)));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/settle/4/m-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_event_markets_normalizes_feed_payload() {
        let feed = CannedOddsFeed {
            payload: json!([{
                "nat": "India",
                "gstatus": "ACTIVE",
                "b1": 2.5, "bs1": 5000,
                "l1": 2.52, "ls1": 4000
            }]),
        };
        let app = build_router(test_state(Arc::new(feed)));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/markets/evt-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let snapshots: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0]["selection"], "India");
    }

    #[tokio::test]
    async fn test_event_markets_provider_down_is_503() {
        let app = build_router(test_state(Arc::new(UnreachableOddsFeed)));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/markets/evt-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
