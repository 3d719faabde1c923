//! Service Configuration
//!
//! Defines where training data is discovered, where the fitted artifact bundle is
//! persisted, which dataset to train on and the seed used throughout training.
use crate::constants::ARTIFACT_FILE_NAME;
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

fn default_data_root() -> PathBuf {
    PathBuf::from("/app/data")
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("/app/artifacts")
}
fn default_train_dataset() -> String {
    String::from("none.csv")
}
fn default_random_state() -> u64 {
    42
}

/// Configuration for the `ModelManager`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Root of the dataset layout, datasets live under `<data_root>/train_validate`.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Directory holding the persisted artifact bundle.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Name of the training dataset, with or without the `.csv` extension.
    #[serde(default = "default_train_dataset")]
    pub train_dataset: String,
    /// Seed for the split, the forest and the synthetic fallback dataset.
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            data_root: default_data_root(),
            artifact_dir: default_artifact_dir(),
            train_dataset: default_train_dataset(),
            random_state: default_random_state(),
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from `DATA_ROOT`, `ARTIFACT_DIR`, `TRAIN_DATASET`
    /// and `RANDOM_STATE`, keeping the default for every unset variable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig::default();
        if let Some(v) = lookup("DATA_ROOT") {
            config.data_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TRAIN_DATASET") {
            config.train_dataset = v;
        }
        if let Some(v) = lookup("RANDOM_STATE") {
            match v.trim().parse::<u64>() {
                Ok(seed) => config.random_state = seed,
                Err(_) => warn!(
                    "RANDOM_STATE={} is not a valid seed, keeping {}.",
                    v, config.random_state
                ),
            }
        }
        config
    }

    /// Set the data root.
    pub fn set_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }

    /// Set the artifact directory.
    pub fn set_artifact_dir(mut self, artifact_dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = artifact_dir.into();
        self
    }

    /// Set the training dataset name.
    pub fn set_train_dataset(mut self, train_dataset: impl Into<String>) -> Self {
        self.train_dataset = train_dataset.into();
        self
    }

    /// Set the random state.
    pub fn set_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Fixed location of the persisted bundle.
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(ARTIFACT_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_service_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.data_root, PathBuf::from("/app/data"));
        assert_eq!(config.train_dataset, "none.csv");
        assert_eq!(config.random_state, 42);
        assert_eq!(config.artifact_path(), PathBuf::from("/app/artifacts/model.json"));
    }

    #[test]
    fn test_service_config_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DATA_ROOT", "/tmp/data"),
            ("TRAIN_DATASET", "cohort_2023"),
            ("RANDOM_STATE", "7"),
        ]
        .into_iter()
        .collect();
        let config = ServiceConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_root, PathBuf::from("/tmp/data"));
        assert_eq!(config.artifact_dir, PathBuf::from("/app/artifacts"));
        assert_eq!(config.train_dataset, "cohort_2023");
        assert_eq!(config.random_state, 7);
    }

    #[test]
    fn test_service_config_bad_seed() {
        let config = ServiceConfig::from_lookup(|k| (k == "RANDOM_STATE").then(|| "seven".to_string()));
        assert_eq!(config.random_state, 42);
    }

    #[test]
    fn test_service_config_partial_json() {
        let json = r#"{"train_dataset": "cohort.csv"}"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.train_dataset, "cohort.csv");
        assert_eq!(config.random_state, 42);
    }
}
