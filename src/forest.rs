//! Random Forest
//!
//! Bagged ensemble of CART trees with per-bootstrap balanced class weights.
use crate::constants::FOREST_N_TREES;
use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::sampler::{BootstrapSampler, Sampler};
use crate::tree::Tree;
use crate::utils::fmt_vec_output;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A fitted random forest classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    pub trees: Vec<Tree>,
    pub n_estimators: usize,
    pub seed: u64,
    pub n_features: usize,
    /// Mean decrease in impurity, normalized to sum to one.
    pub importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        RandomForest {
            trees: Vec::new(),
            n_estimators,
            seed,
            n_features: 0,
            importances: Vec::new(),
        }
    }

    /// The fixed candidate: 350 trees.
    pub fn candidate(seed: u64) -> Self {
        Self::new(FOREST_N_TREES, seed)
    }

    fn max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt() as usize).max(1)
    }

    /// Fit every tree on its own bootstrap sample, in parallel.
    pub fn fit(&mut self, data: &DenseMatrix, y: &[u8]) -> Result<()> {
        if data.rows == 0 || data.rows != y.len() {
            return Err(RiskError::InvalidParameter(
                "y".to_string(),
                format!("{} labels", data.rows),
                y.len().to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(RiskError::InvalidParameter(
                "n_estimators".to_string(),
                "at least one tree".to_string(),
                "0".to_string(),
            ));
        }
        let max_features = Self::max_features(data.cols);
        let index: Vec<usize> = (0..data.rows).collect();
        let seed = self.seed;

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let (drawn, _) = BootstrapSampler.sample(&mut rng, &index);
                let (tree_index, sample_weight) = balanced_subsample_weights(&drawn, y);
                let mut tree = Tree::new();
                tree.fit(data, y, tree_index, &sample_weight, max_features, &mut rng);
                tree
            })
            .collect();
        self.n_features = data.cols;
        self.importances = self.mean_importance();
        debug!(
            "Fitted {} trees, mean depth {:.1}, importances [{}].",
            self.trees.len(),
            self.trees.iter().map(|t| t.depth as f64).sum::<f64>() / self.trees.len() as f64,
            fmt_vec_output(&self.importances)
        );
        Ok(())
    }

    fn mean_importance(&self) -> Vec<f64> {
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .filter(|t| t.nodes.len() > 1)
            .map(|t| t.calculate_importance_impurity(self.n_features))
            .collect();
        let mut importance = vec![0.0; self.n_features];
        if per_tree.is_empty() {
            return importance;
        }
        for tree_importance in &per_tree {
            for (acc, v) in importance.iter_mut().zip(tree_importance) {
                *acc += v;
            }
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }

    /// Mean positive class probability over the trees.
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }
}

/// Distinct drawn rows and their weights: bootstrap multiplicity times the
/// class weight `n / (2 * n_class)` computed on the bootstrap itself.
fn balanced_subsample_weights(drawn: &[usize], y: &[u8]) -> (Vec<usize>, Vec<f64>) {
    let mut counts = vec![0usize; y.len()];
    let mut class_counts = [0usize; 2];
    for &i in drawn {
        counts[i] += 1;
        class_counts[y[i] as usize] += 1;
    }
    let n = drawn.len() as f64;
    let class_weight: Vec<f64> = class_counts
        .iter()
        .map(|&c| if c > 0 { n / (2.0 * c as f64) } else { 0.0 })
        .collect();
    let mut index = Vec::new();
    let mut weights = vec![0.0; y.len()];
    for (i, &c) in counts.iter().enumerate() {
        if c > 0 {
            index.push(i);
            weights[i] = c as f64 * class_weight[y[i] as usize];
        }
    }
    (index, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (DenseMatrix, Vec<u8>) {
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            let positive = i % 4 == 0;
            let x0 = if positive { 5.0 + (i % 7) as f64 * 0.1 } else { (i % 9) as f64 * 0.2 };
            let x1 = (i % 5) as f64;
            data.extend_from_slice(&[x0, x1]);
            y.push(positive as u8);
        }
        (DenseMatrix::new(data, 60, 2), y)
    }

    #[test]
    fn test_forest_fit_predict() {
        let (data, y) = blobs();
        let mut forest = RandomForest::new(25, 42);
        forest.fit(&data, &y).unwrap();
        assert_eq!(forest.trees.len(), 25);
        assert!(forest.predict_proba_row(&[5.3, 1.0]) > 0.5);
        assert!(forest.predict_proba_row(&[0.4, 1.0]) < 0.5);
        let total: f64 = forest.importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(forest.importances[0] > forest.importances[1]);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (data, y) = blobs();
        let mut a = RandomForest::new(10, 7);
        let mut b = RandomForest::new(10, 7);
        a.fit(&data, &y).unwrap();
        b.fit(&data, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balanced_subsample_weights() {
        let y = vec![0, 0, 0, 1];
        let (index, weights) = balanced_subsample_weights(&[0, 0, 1, 3], &y);
        assert_eq!(index, vec![0, 1, 3]);
        // 3 negatives and 1 positive drawn out of 4.
        assert!((weights[0] - 2.0 * 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(weights[2], 0.0);
        assert_eq!(weights[3], 2.0);
    }

    #[test]
    fn test_forest_rejects_empty() {
        let mut forest = RandomForest::new(5, 0);
        assert!(forest.fit(&DenseMatrix::with_cols(2), &[]).is_err());
    }
}
