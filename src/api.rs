//! Request and response payloads of the service, with boundary validation.
use crate::bundle::PredictionResult;
use crate::errors::{Result, RiskError};
use crate::manager::{HealthStatus, ModelManager};
use crate::trainer::FeatureImportance;
use crate::whatif::WhatIfResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type HealthResponse = HealthStatus;
pub type PredictResponse = PredictionResult;
pub type WhatIfResponse = WhatIfResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub features: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfRequest {
    #[serde(default)]
    pub baseline_features: Map<String, Value>,
    #[serde(default)]
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceResponse {
    pub features: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRiskRequest {
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRiskResponse {
    pub probability_fail: f64,
}

/// Error body, with the HTTP status the failure maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub detail: String,
}

impl From<&RiskError> for ErrorResponse {
    fn from(e: &RiskError) -> Self {
        ErrorResponse {
            status: if e.is_client_error() { 400 } else { 500 },
            detail: e.to_string(),
        }
    }
}

fn require_non_empty(field: &str, is_empty: bool) -> Result<()> {
    if is_empty {
        Err(RiskError::InvalidRequest(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

pub fn handle_health(manager: &ModelManager) -> Result<HealthResponse> {
    manager.health()
}

pub fn handle_predict(manager: &ModelManager, request: &PredictRequest) -> Result<PredictResponse> {
    require_non_empty("features", request.features.is_empty())?;
    manager.predict(&request.features)
}

pub fn handle_whatif(manager: &ModelManager, request: &WhatIfRequest) -> Result<WhatIfResponse> {
    require_non_empty("baselineFeatures", request.baseline_features.is_empty())?;
    manager.what_if(&request.baseline_features, &request.overrides)
}

pub fn handle_feature_importance(manager: &ModelManager) -> Result<FeatureImportanceResponse> {
    Ok(FeatureImportanceResponse {
        features: manager.feature_importance()?,
    })
}

pub fn handle_predict_risk(manager: &ModelManager, request: &PredictRiskRequest) -> Result<PredictRiskResponse> {
    require_non_empty("features", request.features.is_empty())?;
    let features: Map<String, Value> = request
        .features
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(*v)))
        .collect();
    Ok(PredictRiskResponse {
        probability_fail: manager.predict_course_risk(&features)?,
    })
}
