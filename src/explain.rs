//! Explainability
//!
//! Per-prediction attributions on the transformed columns, folded back onto the
//! registered features they came from.
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::model::FittedModel;
use crate::preprocessor::aggregate_by_base_feature;
use crate::schema::{display_name, feature_index, FeatureRow};
use crate::shapley::forest_contributions_row;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    IncreaseRisk,
    DecreaseRisk,
}

impl Direction {
    pub fn of(contribution: f64) -> Self {
        if contribution >= 0.0 {
            Direction::IncreaseRisk
        } else {
            Direction::DecreaseRisk
        }
    }
}

/// Signed attribution of one registered feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub feature_key: String,
    pub display_name: String,
    pub contribution: f64,
    pub direction: Direction,
    /// The value before preprocessing, null when missing.
    pub value: Value,
}

/// Exact Shapley attributions per transformed column.
///
/// Tree ensembles use TreeSHAP on the positive class probability. Linear models
/// use linear SHAP in log-odds against the background means.
pub fn exact_contributions(model: &FittedModel, row: &[f64], background: &DenseMatrix) -> Result<Vec<f64>> {
    let contribs = match model {
        FittedModel::TreeEnsemble(forest) => {
            if forest.n_features != row.len() {
                return Err(RiskError::AttributionUnavailable(format!(
                    "forest expects {} features, row has {}",
                    forest.n_features,
                    row.len()
                )));
            }
            let mut contribs = forest_contributions_row(forest, row);
            // Drop the expected value.
            contribs.pop();
            contribs
        }
        FittedModel::Linear(lr) => {
            if lr.coefficients.len() != row.len() || background.cols != row.len() {
                return Err(RiskError::AttributionUnavailable(format!(
                    "linear model expects {} features, row has {}",
                    lr.coefficients.len(),
                    row.len()
                )));
            }
            if background.rows == 0 {
                return Err(RiskError::AttributionUnavailable("empty background sample".to_string()));
            }
            let means = background.column_means();
            lr.coefficients
                .iter()
                .zip(row)
                .zip(&means)
                .map(|((w, x), m)| w * (x - m))
                .collect()
        }
        FittedModel::Other(_) => {
            return Err(RiskError::AttributionUnavailable(format!(
                "no exact attribution for the {} family",
                model.family()
            )))
        }
    };
    if contribs.iter().any(|c| !c.is_finite()) {
        return Err(RiskError::AttributionUnavailable("non-finite attribution".to_string()));
    }
    Ok(contribs)
}

/// Row times coefficients, else row times importances, else zeros.
pub fn proxy_contributions(model: &FittedModel, row: &[f64]) -> Vec<f64> {
    let weights = model.coefficients().or_else(|| model.importances());
    match weights {
        Some(w) => row
            .iter()
            .enumerate()
            .map(|(j, x)| x * w.get(j).copied().unwrap_or(0.0))
            .collect(),
        None => vec![0.0; row.len()],
    }
}

/// Exact attributions, falling back to the proxy when they are unavailable.
pub fn contributions(model: &FittedModel, row: &[f64], background: &DenseMatrix) -> Vec<f64> {
    match exact_contributions(model, row, background) {
        Ok(c) => c,
        Err(e) => {
            warn!("{} Using proxy attributions.", e);
            proxy_contributions(model, row)
        }
    }
}

/// The `top_k` registered features with the largest absolute attribution.
pub fn local_explanations(
    model: &FittedModel,
    transformed_row: &[f64],
    names: &[String],
    background: &DenseMatrix,
    raw_row: &FeatureRow,
    top_k: usize,
) -> Vec<Explanation> {
    let contribs = contributions(model, transformed_row, background);
    let mut grouped: Vec<(&str, f64)> = aggregate_by_base_feature(names, &contribs)
        .into_iter()
        .filter(|(key, _)| feature_index(key).is_some())
        .collect();
    // Stable, so ties keep transformed column order.
    grouped.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    grouped
        .into_iter()
        .take(top_k)
        .map(|(key, contribution)| Explanation {
            feature_key: key.to_string(),
            display_name: display_name(key),
            contribution,
            direction: Direction::of(contribution),
            value: raw_row.get(key).map_or(Value::Null, |v| v.to_json()),
        })
        .collect()
}
