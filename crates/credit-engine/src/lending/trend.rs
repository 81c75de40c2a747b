//! Canonicalises score-history records that arrive under several historical field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields consulted for the score, first present wins.
pub const SCORE_FIELDS: &[&str] = &["score", "credit_score", "value", "y"];

/// Fields consulted for the point label, first present wins; otherwise `#N`.
pub const LABEL_FIELDS: &[&str] = &["label", "month", "date", "period", "x"];

/// Payload keys that may hold the trend array.
pub const SERIES_FIELDS: &[&str] = &["score_trend", "scoreTrend", "score_history"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub score: f64,
}

/// Normalises a JSON array of loosely-shaped points. Non-arrays yield an empty series.
pub fn normalize(raw: &Value) -> Vec<TrendPoint> {
    match raw {
        Value::Array(items) => normalize_points(items),
        _ => Vec::new(),
    }
}

/// Drops points with a score of zero or below and keeps the input order.
pub fn normalize_points(items: &[Value]) -> Vec<TrendPoint> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let score = resolve_score(item);
            if !(score.is_finite() && score > 0.0) {
                return None;
            }
            Some(TrendPoint {
                label: resolve_label(item, index),
                score,
            })
        })
        .collect()
}

/// Picks the first trend array found under [`SERIES_FIELDS`] and normalises it.
pub fn extract_series(payload: &Value) -> Vec<TrendPoint> {
    SERIES_FIELDS
        .iter()
        .find_map(|field| payload.get(*field).filter(|value| !value.is_null()))
        .map(normalize)
        .unwrap_or_default()
}

fn resolve_score(item: &Value) -> f64 {
    SCORE_FIELDS
        .iter()
        .find_map(|field| item.get(*field).filter(|value| !value.is_null()))
        .and_then(numeric)
        .unwrap_or(0.0)
}

fn resolve_label(item: &Value, index: usize) -> String {
    LABEL_FIELDS
        .iter()
        .find_map(|field| item.get(*field).filter(|value| !value.is_null()))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| format!("#{}", index + 1))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_non_positive_scores_and_respects_fallbacks() {
        let raw = json!([
            { "month": "Jan", "credit_score": 700 },
            { "value": 0 },
            { "score": -5 }
        ]);
        assert_eq!(
            normalize(&raw),
            vec![TrendPoint {
                label: "Jan".to_string(),
                score: 700.0
            }]
        );
    }

    #[test]
    fn fallback_order_is_stable() {
        assert_eq!(SCORE_FIELDS, &["score", "credit_score", "value", "y"]);
        assert_eq!(LABEL_FIELDS, &["label", "month", "date", "period", "x"]);

        let raw = json!([{ "score": 710, "credit_score": 650, "label": "Q1", "month": "Mar" }]);
        let points = normalize(&raw);
        assert_eq!(points[0].score, 710.0);
        assert_eq!(points[0].label, "Q1");
    }

    #[test]
    fn positional_labels_use_input_index() {
        let raw = json!([{ "y": 0 }, { "y": "688" }, { "y": 702, "x": 3 }]);
        let points = normalize(&raw);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "#2");
        assert_eq!(points[0].score, 688.0);
        assert_eq!(points[1].label, "3");
    }

    #[test]
    fn malformed_input_is_empty() {
        assert!(normalize(&json!({ "score": 700 })).is_empty());
        assert!(normalize(&Value::Null).is_empty());
        assert!(normalize(&json!(["700", null, { "score": "abc" }])).is_empty());
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let raw = json!([
            { "period": "2025-01", "value": 640 },
            { "y": 655 },
            { "date": "2025-03-01", "score": 671.5 }
        ]);
        let once = normalize(&raw);
        let twice = normalize(&serde_json::to_value(&once).expect("serializes"));
        assert_eq!(once, twice);
    }

    #[test]
    fn series_is_found_under_any_known_key() {
        let payload = json!({ "scoreTrend": [{ "label": "Feb", "score": 690 }] });
        assert_eq!(extract_series(&payload).len(), 1);

        let payload = json!({ "score_trend": null, "score_history": [{ "y": 701 }] });
        assert_eq!(extract_series(&payload)[0].label, "#1");

        assert!(extract_series(&json!({})).is_empty());
    }
}
