use crate::conditions::catalog::{self, ConditionSetting, Derivation};
use crate::conditions::statistics::{exceedance_probability, finite_values, preview, trend_label};
use crate::conditions::units::{heat_index, UnitNormalizer};
use crate::response::result::{ConditionResult, Threshold};
use crate::window::selector::WindowSelection;
use log::{debug, warn};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Raw values of `variable` over the window, nulls as NaN, in row order.
fn column_values(frame: &DataFrame, variable: &str) -> PolarsResult<Vec<f64>> {
    let column = frame.column(variable)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Normalized per-row values of the quantity a condition thresholds on.
fn condition_values(
    selection: &WindowSelection,
    normalizer: &UnitNormalizer,
    setting: &ConditionSetting,
) -> PolarsResult<Vec<f64>> {
    let source = normalizer.normalize(
        setting.source_variable,
        &column_values(&selection.frame, setting.source_variable)?,
    );
    match setting.derivation {
        None => Ok(source),
        Some(Derivation::HeatIndex { humidity }) => {
            let humidity = normalizer.normalize(humidity, &column_values(&selection.frame, humidity)?);
            Ok(source
                .iter()
                .zip(humidity.iter())
                .map(|(t, rh)| heat_index(*t, *rh))
                .collect())
        }
    }
}

fn evaluate_one(
    selection: &WindowSelection,
    normalizer: &UnitNormalizer,
    setting: &ConditionSetting,
) -> Option<ConditionResult> {
    if let Some(missing) = setting
        .required_variables()
        .into_iter()
        .find(|v| selection.frame.get_column_index(v).is_none())
    {
        warn!(
            "Skipping condition '{}': dataset has no variable '{}'",
            setting.name, missing
        );
        return None;
    }

    let values = match condition_values(selection, normalizer, setting) {
        Ok(values) => finite_values(&values),
        Err(e) => {
            warn!("Skipping condition '{}': {}", setting.name, e);
            return None;
        }
    };

    // No finite samples means no evidence either way.
    let probability = exceedance_probability(&values, setting.threshold, setting.comparison)?;

    Some(ConditionResult {
        probability_percent: Some(probability),
        threshold: Threshold {
            value: setting.threshold,
            unit: setting.unit.to_string(),
        },
        trend: trend_label(&values),
        historical_values: preview(&values),
        description: setting.description.to_string(),
    })
}

/// Evaluates each named condition over the window.
///
/// Unknown names, conditions whose variables the dataset lacks, and conditions
/// without a single finite sample are left out of the mapping.
pub fn evaluate<S: AsRef<str>>(
    selection: &WindowSelection,
    normalizer: &UnitNormalizer,
    names: &[S],
) -> BTreeMap<String, ConditionResult> {
    let mut results = BTreeMap::new();
    for name in names {
        let name = name.as_ref();
        let Some(setting) = catalog::lookup(name) else {
            debug!("Ignoring unknown condition '{}'", name);
            continue;
        };
        if results.contains_key(name) {
            continue;
        }
        if let Some(result) = evaluate_one(selection, normalizer, setting) {
            results.insert(name.to_string(), result);
        } else {
            debug!("No result for condition '{}'", name);
        }
    }
    results
}
