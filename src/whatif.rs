//! What-if Simulation
//!
//! Apply overrides to a baseline and report how the risk moves.
use crate::bundle::{risk_bucket, PredictionResult, RiskBucket};
use crate::explain::Explanation;
use crate::schema::{build_full_row, display_name, normalize_features, FeatureRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Anything that can score a full-width row.
pub trait Scorer {
    fn score(&self, row: &FeatureRow) -> PredictionResult;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFeature {
    pub feature_key: String,
    pub display_name: String,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfResult {
    pub baseline_probability: f64,
    pub new_probability: f64,
    pub delta: f64,
    pub bucket: RiskBucket,
    pub changed_features: Vec<ChangedFeature>,
    pub explanations: Vec<Explanation>,
}

/// Score the baseline, apply every override that changes a coerced value, and
/// score again.
pub fn simulate<'a, 'b, S, I, J>(scorer: &S, baseline: I, overrides: J) -> WhatIfResult
where
    S: Scorer + ?Sized,
    I: IntoIterator<Item = (&'a String, &'a Value)>,
    J: IntoIterator<Item = (&'b String, &'b Value)>,
{
    let baseline_row = build_full_row(baseline);
    let baseline_result = scorer.score(&baseline_row);

    let mut modified = baseline_row.clone();
    let mut changed_features = Vec::new();
    for (key, new_value) in normalize_features(overrides) {
        let old_value = baseline_row.get(key).cloned().unwrap_or_default();
        if old_value == new_value {
            continue;
        }
        changed_features.push(ChangedFeature {
            feature_key: key.to_string(),
            display_name: display_name(key),
            old_value: old_value.to_json(),
            new_value: new_value.to_json(),
        });
        modified.set(key, new_value);
    }

    let new_result = scorer.score(&modified);
    WhatIfResult {
        baseline_probability: baseline_result.probability,
        new_probability: new_result.probability,
        delta: new_result.probability - baseline_result.probability,
        bucket: risk_bucket(new_result.probability),
        changed_features,
        explanations: new_result.explanations,
    }
}
