//! Odds normalization — raw provider payloads to canonical ladders.
//!
//! Providers deliver either an array of per-selection records or an
//! object whose list-like fields (`t1`/`t2`/`t3`, `sub`, `grp`, `bets`)
//! hold them. Two ladder encodings exist in the wild:
//!
//! - explicit `b1..b3` / `l1..l3` fields with matching `bs`/`ls` sizes;
//! - a flat `odds` list of `{otype, odds, size}` entries to partition.
//!
//! Some providers quote fixed-point odds: any raw value above 1000 is
//! scaled by 1/100000 to recover decimal odds. A corrupt record is
//! dropped whole rather than half-normalized into a misleading ladder;
//! a payload with no valid selection yields an empty Vec, which callers
//! must treat as "no markets available", not an error.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::debug;

use crate::types::{OddsSnapshot, PriceSize};

/// Raw values above this are fixed-point encoded.
const SCALE_THRESHOLD: Decimal = dec!(1000);
/// Divisor recovering decimal odds from fixed-point values.
const SCALE_DIVISOR: Decimal = dec!(100000);
/// Ladder depth per side.
const LADDER_DEPTH: usize = 3;

/// Object fields that may hold selection record lists.
const LIST_FIELDS: &[&str] = &["t1", "t2", "t3", "sub", "grp", "bets"];
/// Fields that may carry the selection name.
const NAME_FIELDS: &[&str] = &["nat", "name", "runnerName", "runner_name", "selection"];
/// Fields that may carry the provider status string.
const STATUS_FIELDS: &[&str] = &["gstatus", "status"];

/// Normalize a raw provider payload into canonical ladders.
pub fn normalize(raw: &Value) -> Vec<OddsSnapshot> {
    let records = collect_records(raw);
    let snapshots: Vec<OddsSnapshot> = records
        .iter()
        .copied()
        .filter_map(normalize_record)
        .collect();

    debug!(
        records = records.len(),
        selections = snapshots.len(),
        "Odds payload normalized"
    );
    snapshots
}

/// Scale a raw odds value: fixed-point encodings (> 1000) are divided
/// down to decimal odds; everything else passes through unchanged.
pub fn scale_odds(raw: Decimal) -> Decimal {
    if raw > SCALE_THRESHOLD {
        raw / SCALE_DIVISOR
    } else {
        raw
    }
}

fn collect_records(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            let mut records = Vec::new();
            for field in LIST_FIELDS {
                if let Some(Value::Array(items)) = obj.get(*field) {
                    records.extend(items.iter());
                }
            }
            records
        }
        _ => Vec::new(),
    }
}

fn normalize_record(record: &Value) -> Option<OddsSnapshot> {
    let obj = record.as_object()?;

    let selection = NAME_FIELDS
        .iter()
        .find_map(|f| obj.get(*f).and_then(Value::as_str))
        .map(str::to_string)?;

    let status = STATUS_FIELDS
        .iter()
        .find_map(|f| obj.get(*f).and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    let (back, lay) = if obj.contains_key("b1") || obj.contains_key("l1") {
        explicit_ladder(obj)
    } else {
        flat_ladder(obj)?
    };

    // A selection with neither a back nor a lay price is not bettable.
    let valid = back.first().map(|p| p.odds > Decimal::ZERO).unwrap_or(false)
        || lay.first().map(|p| p.odds > Decimal::ZERO).unwrap_or(false);
    if !valid {
        return None;
    }

    Some(OddsSnapshot {
        selection,
        status,
        back,
        lay,
    })
}

/// Read `b1..b3` / `l1..l3` with their `bs`/`ls` sizes directly.
fn explicit_ladder(obj: &serde_json::Map<String, Value>) -> (Vec<PriceSize>, Vec<PriceSize>) {
    let mut back = Vec::new();
    let mut lay = Vec::new();
    for i in 1..=LADDER_DEPTH {
        let b = num(obj.get(&format!("b{i}")));
        if b > Decimal::ZERO {
            back.push(PriceSize {
                odds: scale_odds(b),
                size: num(obj.get(&format!("bs{i}"))),
            });
        }
        let l = num(obj.get(&format!("l{i}")));
        if l > Decimal::ZERO {
            lay.push(PriceSize {
                odds: scale_odds(l),
                size: num(obj.get(&format!("ls{i}"))),
            });
        }
    }
    (back, lay)
}

/// Partition a flat `odds` entry list into back/lay ladders: back sorted
/// best-first (descending), lay ascending, top three of each.
fn flat_ladder(
    obj: &serde_json::Map<String, Value>,
) -> Option<(Vec<PriceSize>, Vec<PriceSize>)> {
    let entries = obj.get("odds")?.as_array()?;

    let mut back = Vec::new();
    let mut lay = Vec::new();
    for entry in entries {
        let entry = match entry.as_object() {
            Some(e) => e,
            None => continue,
        };
        let otype = ["otype", "oType", "type"]
            .iter()
            .find_map(|f| entry.get(*f).and_then(Value::as_str))
            .unwrap_or("")
            .to_lowercase();
        let odds = num(entry.get("odds"));
        if odds <= Decimal::ZERO {
            continue;
        }
        let price = PriceSize {
            odds: scale_odds(odds),
            size: num(entry.get("size")),
        };
        if otype.starts_with("back") || otype == "b" {
            back.push(price);
        } else if otype.starts_with("lay") || otype == "l" {
            lay.push(price);
        }
    }

    back.sort_by(|a, b| b.odds.cmp(&a.odds));
    lay.sort_by(|a, b| a.odds.cmp(&b.odds));
    back.truncate(LADDER_DEPTH);
    lay.truncate(LADDER_DEPTH);
    Some((back, lay))
}

/// Lenient numeric field read: numbers and numeric strings parse,
/// anything else defaults to zero.
fn num(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(Decimal::from_f64)
            .unwrap_or(Decimal::ZERO),
        Some(Value::String(s)) => s.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scale_odds() {
        assert_eq!(scale_odds(dec!(300000)), dec!(3));
        assert_eq!(scale_odds(dec!(2.5)), dec!(2.5));
        // Boundary: exactly 1000 is already decimal.
        assert_eq!(scale_odds(dec!(1000)), dec!(1000));
        assert_eq!(scale_odds(dec!(1001)), dec!(0.01001));
    }

    #[test]
    fn test_explicit_ladder_fields() {
        let raw = json!([{
            "nat": "India",
            "gstatus": "ACTIVE",
            "b1": 2.5, "bs1": 1000,
            "b2": 2.48, "bs2": 500,
            "l1": 2.52, "ls1": 800,
        }]);
        let snaps = normalize(&raw);
        assert_eq!(snaps.len(), 1);
        let snap = &snaps[0];
        assert_eq!(snap.selection, "India");
        assert_eq!(snap.status, "ACTIVE");
        assert_eq!(snap.back.len(), 2);
        assert_eq!(snap.back[0].odds, dec!(2.5));
        assert_eq!(snap.back[0].size, dec!(1000));
        assert_eq!(snap.lay[0].odds, dec!(2.52));
    }

    #[test]
    fn test_flat_list_partitioned_and_sorted() {
        let raw = json!([{
            "name": "Australia",
            "odds": [
                { "otype": "back", "odds": 1.9, "size": 100 },
                { "otype": "back", "odds": 2.1, "size": 200 },
                { "otype": "back", "odds": 2.0, "size": 150 },
                { "otype": "back", "odds": 1.8, "size": 50 },
                { "otype": "lay", "odds": 2.3, "size": 90 },
                { "otype": "lay", "odds": 2.2, "size": 80 },
            ],
        }]);
        let snaps = normalize(&raw);
        assert_eq!(snaps.len(), 1);
        let snap = &snaps[0];
        // Back descending, top 3 of 4.
        let backs: Vec<Decimal> = snap.back.iter().map(|p| p.odds).collect();
        assert_eq!(backs, vec![dec!(2.1), dec!(2.0), dec!(1.9)]);
        // Lay ascending.
        let lays: Vec<Decimal> = snap.lay.iter().map(|p| p.odds).collect();
        assert_eq!(lays, vec![dec!(2.2), dec!(2.3)]);
    }

    #[test]
    fn test_fixed_point_scaling_in_both_paths() {
        let raw = json!([
            { "nat": "A", "b1": 300000, "bs1": 10 },
            { "nat": "B", "odds": [{ "otype": "back", "odds": 195000, "size": 5 }] },
        ]);
        let snaps = normalize(&raw);
        assert_eq!(snaps[0].back[0].odds, dec!(3));
        assert_eq!(snaps[1].back[0].odds, dec!(1.95));
    }

    #[test]
    fn test_object_payload_list_fields() {
        let raw = json!({
            "t1": [{ "nat": "India", "b1": 2.5 }],
            "bets": [{ "nat": "6 Over Runs", "b1": 48, "l1": 49 }],
            "ignored": "scalar",
        });
        let snaps = normalize(&raw);
        assert_eq!(snaps.len(), 2);
    }

    #[test]
    fn test_corrupt_records_dropped_whole() {
        let raw = json!([
            42,
            "not a record",
            { "no_name_field": true, "b1": 2.0 },
            { "nat": "NoPrices" },
            { "nat": "ZeroPrices", "b1": 0, "l1": 0 },
            { "nat": "Good", "b1": 1.9 },
        ]);
        let snaps = normalize(&raw);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].selection, "Good");
    }

    #[test]
    fn test_malformed_fields_default_to_zero() {
        let raw = json!([{ "nat": "India", "b1": "2.5", "bs1": "garbage", "l1": null }]);
        let snaps = normalize(&raw);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].back[0].odds, dec!(2.5));
        assert_eq!(snaps[0].back[0].size, Decimal::ZERO);
        assert!(snaps[0].lay.is_empty());
    }

    #[test]
    fn test_empty_feed_yields_empty_result() {
        assert!(normalize(&json!([])).is_empty());
        assert!(normalize(&json!({})).is_empty());
        assert!(normalize(&json!(null)).is_empty());
    }
}
