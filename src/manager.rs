//! Model Manager
//!
//! Owns the single artifact bundle of the process. The bundle is loaded or
//! trained on first use and never mutated afterwards.
use crate::bundle::{ArtifactBundle, ArtifactIO, PredictionResult};
use crate::config::ServiceConfig;
use crate::constants::SYNTHETIC_DATASET_PATH;
use crate::dataset::{load_training_data, resolve_train_dataset_path};
use crate::errors::{Result, RiskError};
use crate::schema::build_full_row;
use crate::synthetic::synthetic_dataset;
use crate::trainer::{train_best_model, FeatureImportance, ModelMetrics};
use crate::whatif::{simulate, WhatIfResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub model_name: String,
    pub trained_at: String,
    pub dataset_path: String,
}

pub struct ModelManager {
    config: ServiceConfig,
    bundle: OnceLock<Arc<ArtifactBundle>>,
    init_lock: Mutex<()>,
}

impl ModelManager {
    pub fn new(config: ServiceConfig) -> Self {
        ModelManager {
            config,
            bundle: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.get().is_some()
    }

    /// Return the bundle, loading or training it on the first call. Concurrent
    /// first callers wait for a single initialization.
    pub fn ensure_ready(&self) -> Result<Arc<ArtifactBundle>> {
        if let Some(bundle) = self.bundle.get() {
            return Ok(Arc::clone(bundle));
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bundle) = self.bundle.get() {
            return Ok(Arc::clone(bundle));
        }
        let bundle = Arc::new(self.load_or_train()?);
        // Only the lock holder publishes, so the cell is still empty here.
        let _ = self.bundle.set(Arc::clone(&bundle));
        Ok(bundle)
    }

    fn load_or_train(&self) -> Result<ArtifactBundle> {
        let path = self.config.artifact_path();
        match ArtifactBundle::load_artifact(&path).and_then(|bundle| bundle.validate().map(|()| bundle)) {
            Ok(bundle) => {
                info!("Loaded {} from {}.", bundle.model_name, path.display());
                return Ok(bundle);
            }
            Err(e) => info!("No usable artifact at {}: {}", path.display(), e),
        }

        let bundle = self.train_fresh()?;
        match bundle.save_artifact(&path) {
            Ok(()) => info!("Saved artifact to {}.", path.display()),
            Err(e) => warn!("Unable to persist artifact to {}: {}", path.display(), e),
        }
        Ok(bundle)
    }

    fn train_fresh(&self) -> Result<ArtifactBundle> {
        match self.train_on_dataset() {
            Ok(bundle) => Ok(bundle),
            Err(e) => {
                warn!("Training on the configured dataset failed: {} Falling back to synthetic data.", e);
                let seed = self.config.random_state;
                let trained = train_best_model(&synthetic_dataset(seed), seed)?;
                Ok(ArtifactBundle::from_trained(trained, SYNTHETIC_DATASET_PATH))
            }
        }
    }

    fn train_on_dataset(&self) -> Result<ArtifactBundle> {
        let path = resolve_train_dataset_path(&self.config.data_root, &self.config.train_dataset)?;
        let table = load_training_data(&path)?;
        if table.n_distinct_labels() < 2 {
            return Err(RiskError::SingleClassLabel);
        }
        let trained = train_best_model(&table, self.config.random_state)?;
        Ok(ArtifactBundle::from_trained(trained, path.display().to_string()))
    }

    pub fn health(&self) -> Result<HealthStatus> {
        let bundle = self.ensure_ready()?;
        Ok(HealthStatus {
            status: "ok".to_string(),
            model_name: bundle.model_name.clone(),
            trained_at: bundle.trained_at.clone(),
            dataset_path: bundle.dataset_path.clone(),
        })
    }

    pub fn predict<'a, I>(&self, features: I) -> Result<PredictionResult>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let bundle = self.ensure_ready()?;
        Ok(bundle.score(&build_full_row(features)))
    }

    /// Probability of failing the course, without attributions.
    pub fn predict_course_risk<'a, I>(&self, features: I) -> Result<f64>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let bundle = self.ensure_ready()?;
        Ok(bundle.probability(&build_full_row(features)))
    }

    pub fn what_if<'a, 'b, I, J>(&self, baseline: I, overrides: J) -> Result<WhatIfResult>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
        J: IntoIterator<Item = (&'b String, &'b Value)>,
    {
        let bundle = self.ensure_ready()?;
        Ok(simulate(bundle.as_ref(), baseline, overrides))
    }

    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self.ensure_ready()?.global_feature_importance.clone())
    }

    pub fn metrics(&self) -> Result<BTreeMap<String, ModelMetrics>> {
        Ok(self.ensure_ready()?.metrics.clone())
    }
}
