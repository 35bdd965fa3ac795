use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// Unlock timestamp field names, checked in this order.
const UNLOCK_TIME_FIELDS: [&str; 3] = ["unlock_time", "unlockTime", "unlock_date"];

/// One achievement in the Goldberg layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EarnedAchievement {
    pub earned: bool,
    pub earned_time: i64,
}

/// Goldberg `achievements.json`, keyed by achievement name. Sorted so repeated
/// writes of the same data are byte-identical.
pub type DestinationDocument = BTreeMap<String, EarnedAchievement>;

/// Converts a GalaxyEmu achievements document into the Goldberg layout.
///
/// Every key in the source is treated as an earned achievement. When an entry
/// carries no usable timestamp (missing field, `null`, `0`, an empty string, or
/// a value that is not numeric) the current time is recorded instead, so the achievement shows as
/// earned "now" rather than being dropped.
///
/// Fails only when `doc` is not a JSON object.
pub fn transform(doc: &Value) -> Result<DestinationDocument, BridgeError> {
    transform_at(doc, Utc::now().timestamp())
}

/// Same as [`transform`] with an explicit fallback timestamp.
pub fn transform_at(doc: &Value, now: i64) -> Result<DestinationDocument, BridgeError> {
    let entries = doc
        .as_object()
        .ok_or_else(|| BridgeError::MalformedInput(json_kind(doc)))?;

    Ok(entries
        .iter()
        .map(|(name, record)| {
            let earned_time = unlock_time(record).unwrap_or(now);
            (
                name.clone(),
                EarnedAchievement {
                    earned: true,
                    earned_time,
                },
            )
        })
        .collect())
}

fn unlock_time(record: &Value) -> Option<i64> {
    let record = record.as_object()?;
    let raw = UNLOCK_TIME_FIELDS
        .iter()
        .find_map(|field| record.get(*field).filter(|v| is_set(v)))?;
    coerce_timestamp(raw)
}

/// GalaxyEmu writes `0` (and sometimes `""`) for entries it never stamped, so
/// empty-ish values fall through to the next field.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_750_000_000;

    #[test]
    fn explicit_unlock_time_is_preserved() {
        let doc = json!({
            "ach1": { "unlock_time": 1_700_000_000 },
            "ach2": { "unlock_time": 1_600_000_000, "unlocked": true },
        });
        let out = transform_at(&doc, NOW).unwrap();

        assert_eq!(out["ach1"], EarnedAchievement { earned: true, earned_time: 1_700_000_000 });
        assert_eq!(out["ach2"].earned_time, 1_600_000_000);
    }

    #[test]
    fn field_priority_is_unlock_time_then_camel_then_date() {
        let doc = json!({
            "all": { "unlock_date": 3, "unlockTime": 2, "unlock_time": 1 },
            "camel": { "unlock_date": 3, "unlockTime": 2 },
            "date": { "unlock_date": 3 },
            "null_first": { "unlock_time": null, "unlockTime": 2 },
        });
        let out = transform_at(&doc, NOW).unwrap();

        assert_eq!(out["all"].earned_time, 1);
        assert_eq!(out["camel"].earned_time, 2);
        assert_eq!(out["date"].earned_time, 3);
        assert_eq!(out["null_first"].earned_time, 2);
    }

    #[test]
    fn numeric_values_are_coerced() {
        let doc = json!({
            "string": { "unlock_time": " 1700000000 " },
            "float": { "unlock_time": 1_700_000_000.75 },
            "zero_string": { "unlock_time": "0" },
        });
        let out = transform_at(&doc, NOW).unwrap();

        assert_eq!(out["string"].earned_time, 1_700_000_000);
        assert_eq!(out["float"].earned_time, 1_700_000_000);
        assert_eq!(out["zero_string"].earned_time, 0);
    }

    #[test]
    fn unstamped_values_fall_through_to_next_field() {
        let doc = json!({
            "zero_then_camel": { "unlock_time": 0, "unlockTime": 1_700_000_000 },
            "float_zero_then_date": { "unlock_time": 0.0, "unlock_date": 1_600_000_000 },
            "empty_then_camel": { "unlock_time": "", "unlockTime": 1_700_000_000 },
            "false_then_camel": { "unlock_time": false, "unlockTime": 1_700_000_000 },
            "only_zero": { "unlock_time": 0 },
            "all_empty": { "unlock_time": 0, "unlockTime": "", "unlock_date": null },
        });
        let out = transform_at(&doc, NOW).unwrap();

        assert_eq!(out["zero_then_camel"].earned_time, 1_700_000_000);
        assert_eq!(out["float_zero_then_date"].earned_time, 1_600_000_000);
        assert_eq!(out["empty_then_camel"].earned_time, 1_700_000_000);
        assert_eq!(out["false_then_camel"].earned_time, 1_700_000_000);
        assert_eq!(out["only_zero"].earned_time, NOW);
        assert_eq!(out["all_empty"].earned_time, NOW);
    }

    #[test]
    fn unusable_timestamps_fall_back_to_now() {
        let doc = json!({
            "missing": {},
            "garbage": { "unlock_time": "yesterday" },
            "bool": { "unlockTime": true },
            "not_an_object": 5,
        });
        let out = transform_at(&doc, NOW).unwrap();

        assert_eq!(out.len(), 4);
        assert!(out.values().all(|a| a.earned && a.earned_time == NOW));
    }

    #[test]
    fn fallback_uses_wall_clock() {
        let before = Utc::now().timestamp();
        let out = transform(&json!({ "ach": {} })).unwrap();
        let after = Utc::now().timestamp();

        let earned = out["ach"].earned_time;
        assert!(earned >= before && earned <= after + 1);
    }

    #[test]
    fn non_object_top_level_is_malformed() {
        for doc in [json!([1, 2]), json!("text"), json!(null)] {
            assert!(matches!(
                transform_at(&doc, NOW),
                Err(BridgeError::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn equal_inputs_serialize_identically() {
        let doc = json!({
            "b": { "unlock_time": 20 },
            "a": { "unlockTime": "10" },
            "c": {},
        });
        let first = serde_json::to_vec(&transform_at(&doc, NOW).unwrap()).unwrap();
        let second = serde_json::to_vec(&transform_at(&doc, NOW).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_object_yields_empty_document() {
        assert!(transform_at(&json!({}), NOW).unwrap().is_empty());
    }
}
