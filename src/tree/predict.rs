use super::tree::Tree;
use crate::data::DenseMatrix;

impl Tree {
    /// Positive class probability of the leaf the row falls into.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node_idx = 0;
        loop {
            let node = &self.nodes[node_idx];
            if node.is_leaf {
                return node.weight_value;
            }
            node_idx = node.get_child_idx(row[node.split_feature]);
        }
    }

    pub fn predict(&self, data: &DenseMatrix) -> Vec<f64> {
        data.row_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Cover weighted average of the leaves below node `i`, the expected output
    /// of the tree when no feature is known.
    pub fn get_average_leaf_weights(&self, i: usize) -> f64 {
        let node = &self.nodes[i];
        if node.is_leaf {
            node.weight_value
        } else {
            let left_node = &self.nodes[node.left_child];
            let right_node = &self.nodes[node.right_child];
            let mut w = left_node.cover * self.get_average_leaf_weights(node.left_child);
            w += right_node.cover * self.get_average_leaf_weights(node.right_child);
            w / node.cover
        }
    }

    /// Weighted impurity decrease accumulated per feature, normalized to sum to one.
    /// A tree with a single leaf has no importance at all.
    pub fn calculate_importance_impurity(&self, n_features: usize) -> Vec<f64> {
        let mut importance = vec![0.0; n_features];
        for node in self.nodes.iter().filter(|n| !n.is_leaf) {
            let left = &self.nodes[node.left_child];
            let right = &self.nodes[node.right_child];
            importance[node.split_feature] +=
                node.cover * node.impurity - left.cover * left.impurity - right.cover * right.impurity;
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }
}
