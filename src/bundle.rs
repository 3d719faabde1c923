//! Artifact Bundle
//!
//! The immutable fitted state served by the manager, and its JSON persistence.
use crate::constants::{DECISION_THRESHOLD, GREEN_UPPER, TOP_K_EXPLANATIONS, YELLOW_UPPER};
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::explain::{local_explanations, Explanation};
use crate::model::FittedModel;
use crate::preprocessor::Preprocessor;
use crate::schema::{FeatureRow, FEATURE_DEFINITIONS};
use crate::trainer::{FeatureImportance, ModelMetrics, TrainedModel};
use crate::whatif::Scorer;
use chrono::{SecondsFormat, Utc};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Traffic light risk band of a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    Green,
    Yellow,
    Red,
}

pub fn risk_bucket(probability: f64) -> RiskBucket {
    if probability < GREEN_UPPER {
        RiskBucket::Green
    } else if probability < YELLOW_UPPER {
        RiskBucket::Yellow
    } else {
        RiskBucket::Red
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub label: u8,
    pub bucket: RiskBucket,
    pub explanations: Vec<Explanation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub model: FittedModel,
    pub model_name: String,
    pub preprocessor: Preprocessor,
    pub metrics: BTreeMap<String, ModelMetrics>,
    pub global_feature_importance: Vec<FeatureImportance>,
    pub transformed_feature_names: Vec<String>,
    pub background_sample: DenseMatrix,
    /// RFC 3339, UTC.
    pub trained_at: String,
    pub dataset_path: String,
}

impl ArtifactBundle {
    /// Stamp a freshly trained model with the training time and data source.
    pub fn from_trained(trained: TrainedModel, dataset_path: impl Into<String>) -> Self {
        ArtifactBundle {
            model: trained.model,
            model_name: trained.model_name,
            preprocessor: trained.preprocessor,
            metrics: trained.metrics,
            global_feature_importance: trained.global_feature_importance,
            transformed_feature_names: trained.transformed_feature_names,
            background_sample: trained.background_sample,
            trained_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            dataset_path: dataset_path.into(),
        }
    }

    /// Check that the parts of a loaded bundle agree on the transformed width
    /// and only reference registered features.
    pub fn validate(&self) -> Result<()> {
        let n_registered = FEATURE_DEFINITIONS.len();
        let indices = self
            .preprocessor
            .numeric
            .iter()
            .map(|c| (&c.key, c.index))
            .chain(self.preprocessor.categorical.iter().map(|c| (&c.key, c.index)));
        for (key, index) in indices {
            if index >= n_registered {
                return Err(RiskError::ArtifactLoadFailure(format!(
                    "column {} has index {} past {} registered features",
                    key, index, n_registered
                )));
            }
        }

        let width = self.preprocessor.n_features_out();
        let background = &self.background_sample;
        if self.transformed_feature_names.len() != width || background.cols != width {
            return Err(RiskError::ArtifactLoadFailure(format!(
                "preprocessor emits {} columns, names have {}, background has {}",
                width,
                self.transformed_feature_names.len(),
                background.cols
            )));
        }
        if background.data.len() != background.rows * background.cols {
            return Err(RiskError::ArtifactLoadFailure(format!(
                "background holds {} values for {} x {}",
                background.data.len(),
                background.rows,
                background.cols
            )));
        }
        self.model.validate(width)
    }

    pub fn probability(&self, row: &FeatureRow) -> f64 {
        self.model.predict_proba_row(&self.preprocessor.transform_row(row))
    }

    pub fn probabilities(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.par_iter().map(|r| self.probability(r)).collect()
    }

    /// Probability, label, bucket and the top attributions of one row.
    pub fn score(&self, row: &FeatureRow) -> PredictionResult {
        let transformed = self.preprocessor.transform_row(row);
        let probability = self.model.predict_proba_row(&transformed);
        let explanations = local_explanations(
            &self.model,
            &transformed,
            &self.transformed_feature_names,
            &self.background_sample,
            row,
            TOP_K_EXPLANATIONS,
        );
        PredictionResult {
            probability,
            label: u8::from(probability >= DECISION_THRESHOLD),
            bucket: risk_bucket(probability),
            explanations,
        }
    }
}

impl Scorer for ArtifactBundle {
    fn score(&self, row: &FeatureRow) -> PredictionResult {
        ArtifactBundle::score(self, row)
    }
}

pub trait ArtifactIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file, creating the parent directory.
    ///
    /// * `path` - Path to save the artifact.
    fn save_artifact<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RiskError::UnableToWrite(e.to_string()))?;
        }
        fs::write(path, self.json_dump()?).map_err(|e| RiskError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object
    fn json_dump(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RiskError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str::<Self>(json_str).map_err(|e| RiskError::ArtifactLoadFailure(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load the artifact from.
    fn load_artifact<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json_str = fs::read_to_string(path).map_err(|e| RiskError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ArtifactIO for ArtifactBundle {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LogisticRegression;
    use crate::schema::FeatureValue;
    use tempfile::tempdir;

    fn small_bundle() -> ArtifactBundle {
        let mut rows = Vec::new();
        for i in 0..6 {
            let mut row = FeatureRow::empty();
            row.set("absence", FeatureValue::Numeric(i as f64 * 10.0));
            rows.push(row);
        }
        let preprocessor = Preprocessor::fit(&rows).unwrap();
        let names = preprocessor.feature_names_out();
        let mut lr = LogisticRegression::new();
        lr.coefficients = names.iter().map(|n| if n == "num__absence" { 1.5 } else { 0.0 }).collect();
        lr.intercept = -0.2;
        let background = preprocessor.transform(&rows);
        ArtifactBundle {
            model: FittedModel::Linear(lr),
            model_name: "logistic_regression".to_string(),
            preprocessor,
            metrics: BTreeMap::new(),
            global_feature_importance: Vec::new(),
            transformed_feature_names: names,
            background_sample: background,
            trained_at: "2024-01-01T00:00:00Z".to_string(),
            dataset_path: "memory".to_string(),
        }
    }

    #[test]
    fn test_risk_bucket_boundaries() {
        assert_eq!(risk_bucket(0.0), RiskBucket::Green);
        assert_eq!(risk_bucket(0.329999), RiskBucket::Green);
        assert_eq!(risk_bucket(0.33), RiskBucket::Yellow);
        assert_eq!(risk_bucket(0.659999), RiskBucket::Yellow);
        assert_eq!(risk_bucket(0.66), RiskBucket::Red);
        assert_eq!(risk_bucket(1.0), RiskBucket::Red);
        assert_eq!(serde_json::to_value(RiskBucket::Yellow).unwrap(), "yellow");
    }

    #[test]
    fn test_score() {
        let bundle = small_bundle();
        let mut row = FeatureRow::empty();
        row.set("absence", FeatureValue::Numeric(50.0));
        let result = bundle.score(&row);
        assert!(result.probability > 0.5);
        assert_eq!(result.label, 1);
        assert_eq!(result.bucket, risk_bucket(result.probability));
        assert_eq!(result.explanations[0].feature_key, "absence");
        assert!(result.explanations.len() <= TOP_K_EXPLANATIONS);
        assert_eq!(bundle.probabilities(&[row]), vec![result.probability]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let bundle = small_bundle();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        bundle.save_artifact(&path).unwrap();
        let loaded = ArtifactBundle::load_artifact(&path).unwrap();
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn test_validate_inconsistent_bundle() {
        let bundle = small_bundle();
        assert!(bundle.validate().is_ok());

        let mut bad_index = bundle.clone();
        bad_index.preprocessor.numeric[0].index = 99;
        assert!(matches!(bad_index.validate(), Err(RiskError::ArtifactLoadFailure(_))));

        let mut bad_names = bundle.clone();
        bad_names.transformed_feature_names.pop();
        assert!(bad_names.validate().is_err());

        let mut bad_background = bundle.clone();
        bad_background.background_sample.data.pop();
        assert!(bad_background.validate().is_err());

        let mut bad_model = bundle;
        if let FittedModel::Linear(lr) = &mut bad_model.model {
            lr.coefficients.push(1.0);
        }
        assert!(bad_model.validate().is_err());
    }

    #[test]
    fn test_load_failures() {
        let dir = tempdir().unwrap();
        let missing = ArtifactBundle::load_artifact(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(RiskError::UnableToRead(_))));
        assert!(matches!(
            ArtifactBundle::from_json("{\"model\": 1}"),
            Err(RiskError::ArtifactLoadFailure(_))
        ));
    }
}
