use crate::conditions::catalog::Comparison;
use crate::utils::round1;

/// Below this many finite samples no direction is reported.
pub const MIN_TREND_SAMPLES: usize = 12;
/// Upper bound on the number of values echoed back in a result.
pub const PREVIEW_LIMIT: usize = 120;

const TREND_EPSILON: f64 = 1e-6;

pub const STABLE: &str = "stable";

/// Finite values only, order preserved.
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Share of `values` satisfying the comparison, in percent with one decimal.
///
/// `values` must already be finite. Returns `None` for an empty slice.
pub fn exceedance_probability(values: &[f64], threshold: f64, comparison: Comparison) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let hits = values
        .iter()
        .filter(|v| comparison.holds(**v, threshold))
        .count();
    Some(round1(hits as f64 / values.len() as f64 * 100.0))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compares the mean of the first half of `values` with that of the second half.
///
/// ```
/// use climate_risk::trend_label;
///
/// let mut values = vec![10.0; 10];
/// values.extend(vec![15.0; 10]);
/// assert_eq!(trend_label(&values), "increasing 50.0%");
/// assert_eq!(trend_label(&values[..11]), "stable");
/// ```
pub fn trend_label(values: &[f64]) -> String {
    if values.len() < MIN_TREND_SAMPLES {
        return STABLE.to_string();
    }
    let (early, late) = values.split_at(values.len() / 2);
    let early_mean = mean(early);
    let late_mean = mean(late);

    if early_mean.abs() < TREND_EPSILON {
        return format!("Δ {:.1}", late_mean - early_mean);
    }
    let percent_change = (late_mean - early_mean) / early_mean.abs() * 100.0;
    if percent_change > 0.0 {
        format!("increasing {:.1}%", percent_change)
    } else {
        format!("declining {:.1}%", percent_change.abs())
    }
}

/// The first [`PREVIEW_LIMIT`] values, rounded to one decimal.
pub fn preview(values: &[f64]) -> Vec<f64> {
    values.iter().take(PREVIEW_LIMIT).map(|v| round1(*v)).collect()
}
