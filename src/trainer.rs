//! Model Trainer
//!
//! Splits the table, fits the preprocessor and both candidate families, and
//! keeps the candidate with the best validation F1.
use crate::constants::{BACKGROUND_ROWS, VALIDATION_FRACTION};
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::forest::RandomForest;
use crate::linear::LogisticRegression;
use crate::metric::{is_comparison_better, Metric};
use crate::model::FittedModel;
use crate::preprocessor::{aggregate_by_base_feature, Preprocessor};
use crate::sampler::{Sampler, StratifiedSampler};
use crate::schema::{display_name, feature_index, FeatureRow};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cleaned training data: full-width rows and their 0/1 labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingTable {
    pub rows: Vec<FeatureRow>,
    pub labels: Vec<u8>,
}

impl TrainingTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_distinct_labels(&self) -> usize {
        let has_pos = self.labels.iter().any(|&l| l == 1);
        let has_neg = self.labels.iter().any(|&l| l == 0);
        usize::from(has_pos) + usize::from(has_neg)
    }

    fn select(&self, index: &[usize]) -> (Vec<FeatureRow>, Vec<u8>) {
        (
            index.iter().map(|&i| self.rows[i].clone()).collect(),
            index.iter().map(|&i| self.labels[i]).collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureImportance {
    pub feature_key: String,
    pub display_name: String,
    pub score: f64,
}

/// Everything the selection produced, before it is stamped into a bundle.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: FittedModel,
    pub model_name: String,
    pub preprocessor: Preprocessor,
    pub metrics: BTreeMap<String, ModelMetrics>,
    pub global_feature_importance: Vec<FeatureImportance>,
    pub transformed_feature_names: Vec<String>,
    pub background_sample: DenseMatrix,
}

/// The candidate families, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    LogisticRegression,
    RandomForest,
}

impl Candidate {
    pub const ALL: [Candidate; 2] = [Candidate::LogisticRegression, Candidate::RandomForest];

    pub fn name(&self) -> &'static str {
        match self {
            Candidate::LogisticRegression => "logistic_regression",
            Candidate::RandomForest => "random_forest",
        }
    }

    pub fn fit(&self, data: &DenseMatrix, y: &[u8], seed: u64) -> Result<FittedModel> {
        match self {
            Candidate::LogisticRegression => {
                let mut model = LogisticRegression::new();
                model.fit(data, y)?;
                Ok(FittedModel::Linear(model))
            }
            Candidate::RandomForest => {
                let mut model = RandomForest::candidate(seed);
                model.fit(data, y)?;
                Ok(FittedModel::TreeEnsemble(model))
            }
        }
    }
}

/// Train both candidates and keep the one with the strictly greatest
/// validation F1; the earlier candidate wins ties.
pub fn train_best_model(table: &TrainingTable, seed: u64) -> Result<TrainedModel> {
    if table.labels.len() != table.rows.len() {
        return Err(RiskError::InvalidParameter(
            "labels".to_string(),
            format!("{} labels", table.rows.len()),
            table.labels.len().to_string(),
        ));
    }
    if table.n_distinct_labels() < 2 {
        return Err(RiskError::SingleClassLabel);
    }

    let index: Vec<usize> = (0..table.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampler = StratifiedSampler::new(&table.labels, VALIDATION_FRACTION)?;
    let (train_index, valid_index) = sampler.sample(&mut rng, &index);
    let (train_rows, train_y) = table.select(&train_index);
    let (valid_rows, valid_y) = table.select(&valid_index);

    let preprocessor = Preprocessor::fit(&train_rows)?;
    let x_train = preprocessor.transform(&train_rows);
    let x_valid = preprocessor.transform(&valid_rows);
    let names = preprocessor.feature_names_out();
    info!(
        "Training on {} rows, validating on {} rows, {} transformed features.",
        x_train.rows,
        x_valid.rows,
        names.len()
    );

    let metric = Metric::F1;
    let mut metrics = BTreeMap::new();
    let mut best: Option<(Candidate, FittedModel, f64)> = None;
    for candidate in Candidate::ALL {
        let model = match candidate.fit(&x_train, &train_y, seed) {
            Ok(m) => m,
            Err(e) => {
                warn!("Candidate {} failed to fit: {}", candidate.name(), e);
                continue;
            }
        };
        let score = metric.metric_fn()(&valid_y, &model.predict(&x_valid));
        info!("Candidate {} validation {}: {:.4}", candidate.name(), metric.name(), score);
        metrics.insert(candidate.name().to_string(), ModelMetrics { f1: score });
        let better = match &best {
            None => true,
            Some((_, _, best_score)) => is_comparison_better(*best_score, score, metric.maximize()),
        };
        if better {
            best = Some((candidate, model, score));
        }
    }

    let (candidate, model, score) =
        best.ok_or_else(|| RiskError::ModelSelectionFailure("no candidate model could be fitted".to_string()))?;
    info!("Selected {} with {} {:.4}.", candidate.name(), metric.name(), score);

    let global_feature_importance = compute_global_feature_importance(&model, &names);
    Ok(TrainedModel {
        model,
        model_name: candidate.name().to_string(),
        preprocessor,
        metrics,
        global_feature_importance,
        transformed_feature_names: names,
        background_sample: x_train.head(BACKGROUND_ROWS),
    })
}

/// Native importance folded onto registered features, normalized to sum to one
/// and sorted by descending score.
pub fn compute_global_feature_importance(model: &FittedModel, names: &[String]) -> Vec<FeatureImportance> {
    let signal = model.native_importance(names.len());
    let grouped: Vec<(&str, f64)> = aggregate_by_base_feature(names, &signal)
        .into_iter()
        .filter(|(key, _)| feature_index(key).is_some())
        .collect();
    let total: f64 = grouped.iter().map(|(_, v)| v).sum();
    let total = if total > 0.0 { total } else { 1.0 };
    let mut importance: Vec<FeatureImportance> = grouped
        .into_iter()
        .map(|(key, v)| FeatureImportance {
            feature_key: key.to_string(),
            display_name: display_name(key),
            score: v / total,
        })
        .collect();
    importance.sort_by(|a, b| b.score.total_cmp(&a.score));
    importance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassPrior;
    use crate::schema::FeatureValue;

    fn toy_table(n: usize) -> TrainingTable {
        let mut table = TrainingTable::default();
        for i in 0..n {
            let fail = i % 3 == 0;
            let mut row = FeatureRow::empty();
            row.set("absence", FeatureValue::Numeric(if fail { 60.0 } else { 20.0 } + (i % 7) as f64));
            row.set("logins", FeatureValue::Numeric(if fail { 5.0 } else { 50.0 } + (i % 5) as f64));
            row.set(
                "gender",
                FeatureValue::Categorical(if i % 2 == 0 { "male" } else { "female" }.to_string()),
            );
            table.rows.push(row);
            table.labels.push(u8::from(fail));
        }
        table
    }

    #[test]
    fn test_train_best_model() {
        let table = toy_table(60);
        let trained = train_best_model(&table, 42).unwrap();
        assert!(Candidate::ALL.iter().any(|c| c.name() == trained.model_name));
        assert_eq!(trained.metrics.len(), 2);
        assert!(trained.metrics.values().all(|m| (0.0..=1.0).contains(&m.f1)));
        assert_eq!(trained.background_sample.rows, 48);
        assert_eq!(trained.transformed_feature_names.len(), trained.background_sample.cols);

        let total: f64 = trained.global_feature_importance.iter().map(|f| f.score).sum();
        assert!((total - 1.0).abs() < 1e-9);
        for pair in trained.global_feature_importance.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_single_class_is_rejected() {
        let mut table = toy_table(10);
        table.labels = vec![0; 10];
        assert!(matches!(train_best_model(&table, 1), Err(RiskError::SingleClassLabel)));
    }

    #[test]
    fn test_uniform_importance_for_other_family() {
        let names = vec![
            "num__age".to_string(),
            "cat__gender_female".to_string(),
            "cat__gender_male".to_string(),
            "unknown".to_string(),
        ];
        let model = FittedModel::Other(ClassPrior { positive_rate: 0.5 });
        let importance = compute_global_feature_importance(&model, &names);
        assert_eq!(importance.len(), 2);
        assert_eq!(importance[0].feature_key, "gender");
        assert!((importance[0].score - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(importance[1].display_name, "Age");
    }

    #[test]
    fn test_zero_importance_does_not_divide_by_zero() {
        let mut forest = RandomForest::new(1, 0);
        forest.importances = vec![0.0, 0.0];
        let model = FittedModel::TreeEnsemble(forest);
        let names = vec!["num__age".to_string(), "num__logins".to_string()];
        let importance = compute_global_feature_importance(&model, &names);
        assert!(importance.iter().all(|f| f.score == 0.0));
    }
}
