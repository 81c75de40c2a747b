use super::RiskBand;

/// Score-based probability of default, nudged by band and utilization. Returned as a
/// fraction in `[0.01, 0.95]`, rounded to four decimals.
pub fn default_probability(score: f64, band: RiskBand, utilization_pct: Option<f64>) -> f64 {
    let safe_score = if score.is_finite() {
        score.clamp(300.0, 900.0)
    } else {
        300.0
    };
    let baseline = (850.0 - safe_score) / 550.0;

    let band_adjustment = match band {
        RiskBand::Low => -0.03,
        RiskBand::High => 0.05,
        RiskBand::Medium | RiskBand::Unknown => 0.0,
    };

    let utilization_adjustment = utilization_pct
        .filter(|value| value.is_finite())
        .map(|value| (value.clamp(0.0, 100.0) - 40.0) / 1000.0)
        .unwrap_or(0.0);

    let raw = baseline + band_adjustment + utilization_adjustment;
    (raw.clamp(0.01, 0.95) * 10_000.0).round() / 10_000.0
}

pub fn as_percentage(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_scores_have_low_default_probability() {
        let probability = default_probability(800.0, RiskBand::Low, Some(10.0));
        // (850-800)/550 - 0.03 - 0.03
        assert!((probability - 0.0309).abs() < 1e-9);
        assert!((as_percentage(probability) - 3.09).abs() < 1e-9);
    }

    #[test]
    fn probability_is_bounded() {
        assert_eq!(default_probability(900.0, RiskBand::Low, Some(0.0)), 0.01);
        assert_eq!(default_probability(300.0, RiskBand::High, Some(100.0)), 0.95);
        assert_eq!(default_probability(f64::NAN, RiskBand::Unknown, None), 0.95);
    }

    #[test]
    fn band_thresholds_line_up_with_classifier() {
        let low_edge = as_percentage(default_probability(700.0, RiskBand::Low, None));
        let medium_edge = as_percentage(default_probability(650.0, RiskBand::Medium, None));
        assert!(low_edge <= 25.0);
        assert!(medium_edge <= 40.0 && medium_edge > 25.0);
    }
}
