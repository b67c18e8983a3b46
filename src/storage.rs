//! Persistence layer.
//!
//! Saves and loads a snapshot of markets and bets to/from a JSON file so
//! a restarted process resumes where it left off. The transactional
//! boundary lives in the stores themselves; this file is a convenience
//! snapshot, not the system of record for in-flight operations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Bet, Market};

/// Default snapshot file path.
const DEFAULT_SNAPSHOT_FILE: &str = "wagermill_state.json";

/// Full engine state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub markets: Vec<Market>,
    pub bets: Vec<Bet>,
}

/// Save a snapshot to a JSON file.
pub fn save_snapshot(snapshot: &EngineSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise engine snapshot")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write snapshot to {path}"))?;

    debug!(
        path,
        markets = snapshot.markets.len(),
        bets = snapshot.bets.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: Option<&str>) -> Result<Option<EngineSnapshot>> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved snapshot found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: EngineSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        markets = snapshot.markets.len(),
        bets = snapshot.bets.len(),
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the snapshot file (for testing or reset).
pub fn delete_snapshot(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_SNAPSHOT_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete snapshot file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketKey, MarketStatus, MarketType};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn temp_path() -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("wagermill_test_state_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    fn sample_snapshot() -> EngineSnapshot {
        EngineSnapshot {
            markets: vec![Market {
                id: "mkt-1".to_string(),
                key: MarketKey {
                    event_id: "evt-1".to_string(),
                    sport: "cricket".to_string(),
                    market_name: "Match Odds".to_string(),
                    market_type: MarketType::Odds,
                    selection: "India".to_string(),
                },
                odds_back: dec!(2.5),
                odds_lay: dec!(2.52),
                rate_yes: Decimal::ZERO,
                rate_no: Decimal::ZERO,
                current_line: Decimal::ZERO,
                status: MarketStatus::Open,
                sports_id: "4".to_string(),
                match_id: "m-1".to_string(),
                created_at: Utc::now(),
                settled_at: None,
            }],
            bets: Vec::new(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        save_snapshot(&sample_snapshot(), Some(&path)).unwrap();

        let loaded = load_snapshot(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.markets.len(), 1);
        assert_eq!(loaded.markets[0].id, "mkt-1");
        assert_eq!(loaded.markets[0].odds_back, dec!(2.5));
        assert!(loaded.bets.is_empty());

        delete_snapshot(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let loaded = load_snapshot(Some("/tmp/wagermill_nonexistent_12345.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_delete_snapshot() {
        let path = temp_path();
        save_snapshot(&sample_snapshot(), Some(&path)).unwrap();
        assert!(Path::new(&path).exists());

        delete_snapshot(Some(&path)).unwrap();
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        assert!(delete_snapshot(Some("/tmp/wagermill_does_not_exist.json")).is_ok());
    }
}
