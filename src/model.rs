//! Fitted Model
//!
//! The selected classifier, tagged by family so callers match on what the model
//! exposes instead of probing for it.
use crate::constants::DECISION_THRESHOLD;
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::forest::RandomForest;
use crate::linear::LogisticRegression;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Predicts the training positive rate for every row. Stands in for any model
/// family that exposes neither coefficients nor importances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassPrior {
    pub positive_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", content = "model")]
pub enum FittedModel {
    Linear(LogisticRegression),
    TreeEnsemble(RandomForest),
    Other(ClassPrior),
}

impl FittedModel {
    pub fn family(&self) -> &'static str {
        match self {
            FittedModel::Linear(_) => "linear",
            FittedModel::TreeEnsemble(_) => "tree_ensemble",
            FittedModel::Other(_) => "other",
        }
    }

    /// Probability of the positive (fail) class.
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        let p = match self {
            FittedModel::Linear(m) => m.predict_proba_row(row),
            FittedModel::TreeEnsemble(m) => m.predict_proba_row(row),
            FittedModel::Other(m) => m.positive_rate,
        };
        p.clamp(0.0, 1.0)
    }

    pub fn predict_proba(&self, data: &DenseMatrix) -> Vec<f64> {
        (0..data.rows)
            .into_par_iter()
            .map(|i| self.predict_proba_row(data.row(i)))
            .collect()
    }

    /// Hard labels used for validation. A probability of exactly 0.5 is the
    /// negative class.
    pub fn predict(&self, data: &DenseMatrix) -> Vec<u8> {
        self.predict_proba(data)
            .into_iter()
            .map(|p| u8::from(p > DECISION_THRESHOLD))
            .collect()
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        match self {
            FittedModel::Linear(m) => Some(&m.coefficients),
            _ => None,
        }
    }

    pub fn importances(&self) -> Option<&[f64]> {
        match self {
            FittedModel::TreeEnsemble(m) => Some(&m.importances),
            _ => None,
        }
    }

    /// Per transformed feature importance signal: absolute coefficients,
    /// impurity importances, or uniform ones.
    pub fn native_importance(&self, n_features: usize) -> Vec<f64> {
        let mut signal: Vec<f64> = match self {
            FittedModel::Linear(m) => m.coefficients.iter().map(|w| w.abs()).collect(),
            FittedModel::TreeEnsemble(m) => m.importances.clone(),
            FittedModel::Other(_) => vec![1.0; n_features],
        };
        signal.resize(n_features, 0.0);
        signal
    }

    /// Check that the model scores rows of exactly `n_features` columns.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        let mismatch = |what: &str, found: usize| {
            RiskError::ArtifactLoadFailure(format!("{} has {} entries, expected {}", what, found, n_features))
        };
        match self {
            FittedModel::Linear(m) => {
                if m.coefficients.len() != n_features {
                    return Err(mismatch("coefficients", m.coefficients.len()));
                }
            }
            FittedModel::TreeEnsemble(m) => {
                if m.n_features != n_features {
                    return Err(mismatch("forest width", m.n_features));
                }
                if m.importances.len() != n_features {
                    return Err(mismatch("importances", m.importances.len()));
                }
                for tree in &m.trees {
                    tree.validate(n_features)?;
                }
            }
            FittedModel::Other(m) => {
                if !(0.0..=1.0).contains(&m.positive_rate) {
                    return Err(RiskError::ArtifactLoadFailure(format!(
                        "positive rate {} outside [0, 1]",
                        m.positive_rate
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_prior() {
        let model = FittedModel::Other(ClassPrior { positive_rate: 0.75 });
        assert_eq!(model.predict_proba_row(&[1.0, 2.0]), 0.75);
        assert!(model.coefficients().is_none());
        assert!(model.importances().is_none());
        assert_eq!(model.native_importance(3), vec![1.0; 3]);
    }

    #[test]
    fn test_linear_native_importance() {
        let mut lr = LogisticRegression::new();
        lr.coefficients = vec![-2.0, 0.5];
        let model = FittedModel::Linear(lr);
        assert_eq!(model.native_importance(2), vec![2.0, 0.5]);
        assert_eq!(model.coefficients(), Some(&[-2.0, 0.5][..]));
        let data = DenseMatrix::new(vec![-1.0, 0.0, 1.0, 0.0], 2, 2);
        assert_eq!(model.predict(&data), vec![1, 0]);
    }

    #[test]
    fn test_predict_tie_is_negative() {
        let model = FittedModel::Other(ClassPrior { positive_rate: 0.5 });
        let data = DenseMatrix::new(vec![0.0, 1.0], 2, 1);
        assert_eq!(model.predict(&data), vec![0, 0]);
    }

    #[test]
    fn test_validate_width() {
        let mut lr = LogisticRegression::new();
        lr.coefficients = vec![0.1, 0.2, 0.3];
        let model = FittedModel::Linear(lr);
        assert!(model.validate(3).is_ok());
        assert!(matches!(model.validate(4), Err(RiskError::ArtifactLoadFailure(_))));

        let mut forest = RandomForest::new(1, 0);
        forest.n_features = 2;
        forest.importances = vec![0.5];
        assert!(FittedModel::TreeEnsemble(forest).validate(2).is_err());
        assert!(FittedModel::Other(ClassPrior { positive_rate: 1.5 }).validate(2).is_err());
    }

    #[test]
    fn test_fitted_model_serde() {
        let model = FittedModel::Other(ClassPrior { positive_rate: 0.25 });
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"family\":\"Other\""));
        let back: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
