use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Share of a factor's maximum at or above which it is called out as a strength.
const STRONG_PERCENT: u8 = 75;
/// Share of a factor's maximum below which it is called out as a weakness.
const WEAK_PERCENT: u8 = 55;

/// One weighted contributor to the approver's score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactor {
    pub key: &'static str,
    pub label: &'static str,
    pub weight: f64,
    /// Reported or defaulted rating, 0-100.
    pub value: u8,
    pub points: f64,
    pub max_points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorBreakdown {
    pub factors: Vec<ScoreFactor>,
    pub positive_factors: Vec<String>,
    pub negative_factors: Vec<String>,
}

/// Headline factor shown on the borrower dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyFactor {
    pub label: &'static str,
    pub value: u8,
}

#[derive(Debug, Clone, Copy)]
enum Fallback {
    Fixed(u8),
    /// `100 - utilization`, floored at 0.
    UtilizationHeadroom,
    /// `100 - 0.9 * utilization`, floored at 35.
    DebtToIncome,
}

impl Fallback {
    fn value(self, utilization_pct: f64) -> u8 {
        match self {
            Fallback::Fixed(value) => value,
            Fallback::UtilizationHeadroom => to_rating(100.0 - utilization_pct),
            Fallback::DebtToIncome => to_rating(100.0 - utilization_pct * 0.9).max(35),
        }
    }
}

struct WeightedFactor {
    key: &'static str,
    label: &'static str,
    /// Weight in thousandths; doubles as the factor's maximum points.
    permille: u32,
    fallback: Fallback,
}

const WEIGHTED_FACTORS: [WeightedFactor; 10] = [
    WeightedFactor {
        key: "payment_history",
        label: "Payment History",
        permille: 250,
        fallback: Fallback::Fixed(75),
    },
    WeightedFactor {
        key: "credit_utilization",
        label: "Credit Utilization",
        permille: 180,
        fallback: Fallback::UtilizationHeadroom,
    },
    WeightedFactor {
        key: "credit_age",
        label: "Length of Credit History",
        permille: 100,
        fallback: Fallback::Fixed(65),
    },
    WeightedFactor {
        key: "credit_mix",
        label: "Credit Mix",
        permille: 80,
        fallback: Fallback::Fixed(68),
    },
    WeightedFactor {
        key: "inquiries",
        label: "Recent Credit Inquiries",
        permille: 80,
        fallback: Fallback::Fixed(70),
    },
    WeightedFactor {
        key: "debt_to_income",
        label: "Debt-to-Income Ratio",
        permille: 100,
        fallback: Fallback::DebtToIncome,
    },
    WeightedFactor {
        key: "income_stability",
        label: "Income Stability",
        permille: 80,
        fallback: Fallback::Fixed(70),
    },
    WeightedFactor {
        key: "employment_history",
        label: "Employment History",
        permille: 50,
        fallback: Fallback::Fixed(72),
    },
    WeightedFactor {
        key: "delinquencies",
        label: "Delinquencies / Public Records",
        permille: 50,
        fallback: Fallback::Fixed(80),
    },
    WeightedFactor {
        key: "collateral_strength",
        label: "Collateral / Asset Strength",
        permille: 30,
        fallback: Fallback::Fixed(60),
    },
];

const KEY_FACTORS: [(&str, &str, Fallback); 4] = [
    ("payment_history", "Payment History", Fallback::Fixed(85)),
    (
        "credit_utilization",
        "Credit Utilization",
        Fallback::UtilizationHeadroom,
    ),
    ("credit_age", "Credit Age", Fallback::Fixed(68)),
    ("inquiries", "Inquiries", Fallback::Fixed(82)),
];

/// Weighted breakdown of the factors reported by the score source. Missing or
/// non-numeric factors take their fallback; every rating is clamped to 0-100.
pub fn score_breakdown(
    reported: &BTreeMap<String, Value>,
    utilization_pct: f64,
) -> FactorBreakdown {
    let mut breakdown = FactorBreakdown::default();

    for factor in &WEIGHTED_FACTORS {
        let value = rating(reported, factor.key, factor.fallback, utilization_pct);
        let points = (f64::from(value) * f64::from(factor.permille) / 10.0).round() / 10.0;

        if value >= STRONG_PERCENT {
            breakdown
                .positive_factors
                .push(format!("{} is strong.", factor.label));
        } else if value < WEAK_PERCENT {
            breakdown
                .negative_factors
                .push(format!("{} needs improvement.", factor.label));
        }

        breakdown.factors.push(ScoreFactor {
            key: factor.key,
            label: factor.label,
            weight: f64::from(factor.permille) / 1000.0,
            value,
            points,
            max_points: factor.permille,
        });
    }

    breakdown
}

/// The four factors surfaced to borrowers, with dashboard fallbacks.
pub fn key_factors(reported: &BTreeMap<String, Value>, utilization_pct: f64) -> Vec<KeyFactor> {
    KEY_FACTORS
        .iter()
        .map(|(key, label, fallback)| KeyFactor {
            label: *label,
            value: rating(reported, key, *fallback, utilization_pct),
        })
        .collect()
}

fn rating(
    reported: &BTreeMap<String, Value>,
    key: &str,
    fallback: Fallback,
    utilization_pct: f64,
) -> u8 {
    let utilization_pct = if utilization_pct.is_finite() {
        utilization_pct
    } else {
        0.0
    };
    reported
        .get(key)
        .and_then(numeric)
        .map(to_rating)
        .unwrap_or_else(|| fallback.value(utilization_pct))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

fn to_rating(value: f64) -> u8 {
    value.trunc().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reported(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn weights_cover_a_thousand_points() {
        let total: u32 = WEIGHTED_FACTORS.iter().map(|factor| factor.permille).sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn defaults_apply_when_nothing_is_reported() {
        let breakdown = score_breakdown(&BTreeMap::new(), 20.0);
        let values: Vec<_> = breakdown.factors.iter().map(|factor| factor.value).collect();
        assert_eq!(values, vec![75, 80, 65, 68, 70, 82, 70, 72, 80, 60]);

        let payment = &breakdown.factors[0];
        assert_eq!(payment.max_points, 250);
        assert_eq!(payment.points, 187.5);
        assert!((payment.weight - 0.25).abs() < f64::EPSILON);

        assert_eq!(
            breakdown.positive_factors,
            vec![
                "Payment History is strong.",
                "Credit Utilization is strong.",
                "Debt-to-Income Ratio is strong.",
                "Delinquencies / Public Records is strong.",
            ]
        );
        assert!(breakdown.negative_factors.is_empty());
    }

    #[test]
    fn reported_values_are_truncated_and_clamped() {
        let breakdown = score_breakdown(
            &reported(&[
                ("payment_history", json!(140)),
                ("credit_age", json!(-20)),
                ("credit_mix", json!("54.9")),
                ("inquiries", json!("often")),
                ("collateral_strength", json!(33.3)),
            ]),
            0.0,
        );
        let value = |key: &str| {
            breakdown
                .factors
                .iter()
                .find(|factor| factor.key == key)
                .map(|factor| factor.value)
        };

        assert_eq!(value("payment_history"), Some(100));
        assert_eq!(value("credit_age"), Some(0));
        assert_eq!(value("credit_mix"), Some(54));
        assert_eq!(value("inquiries"), Some(70));
        assert_eq!(value("collateral_strength"), Some(33));
        assert_eq!(breakdown.factors[9].points, 9.9);
        assert_eq!(
            breakdown.negative_factors,
            vec![
                "Length of Credit History needs improvement.",
                "Credit Mix needs improvement.",
                "Collateral / Asset Strength needs improvement.",
            ]
        );
    }

    #[test]
    fn heavy_utilization_drags_the_derived_factors() {
        let breakdown = score_breakdown(&BTreeMap::new(), 95.0);
        assert_eq!(breakdown.factors[1].value, 5);
        assert_eq!(breakdown.factors[5].value, 35);
        assert!(breakdown
            .negative_factors
            .contains(&"Credit Utilization needs improvement.".to_string()));
    }

    #[test]
    fn dashboard_key_factors_use_their_own_defaults() {
        let factors = key_factors(&reported(&[("inquiries", json!(40))]), 42.5);
        let pairs: Vec<_> = factors
            .iter()
            .map(|factor| (factor.label, factor.value))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Payment History", 85),
                ("Credit Utilization", 57),
                ("Credit Age", 68),
                ("Inquiries", 40),
            ]
        );
    }
}
