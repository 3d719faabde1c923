use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of a fitted classification tree.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub num: usize,
    /// Weighted fraction of the positive class among the node samples.
    pub weight_value: f64,
    /// Weighted sample count reaching the node.
    pub cover: f64,
    /// Weighted Gini impurity of the node samples.
    pub impurity: f64,
    pub depth: usize,
    pub split_value: f64,
    pub split_feature: usize,
    pub left_child: usize,
    pub right_child: usize,
    pub is_leaf: bool,
}

impl Node {
    pub fn leaf(num: usize, depth: usize, weight_value: f64, cover: f64, impurity: f64) -> Self {
        Node {
            num,
            weight_value,
            cover,
            impurity,
            depth,
            split_value: 0.0,
            split_feature: 0,
            left_child: 0,
            right_child: 0,
            is_leaf: true,
        }
    }

    /// Turn a leaf into a parent node.
    pub fn make_parent_node(&mut self, split_feature: usize, split_value: f64, left_child: usize, right_child: usize) {
        self.is_leaf = false;
        self.split_feature = split_feature;
        self.split_value = split_value;
        self.left_child = left_child;
        self.right_child = right_child;
    }

    /// Get the path that should be traveled down, given a value.
    #[inline]
    pub fn get_child_idx(&self, v: f64) -> usize {
        if v <= self.split_value {
            self.left_child
        } else {
            self.right_child
        }
    }
}

impl fmt::Display for Node {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_leaf {
            write!(f, "{}:leaf={},cover={}", self.num, self.weight_value, self.cover)
        } else {
            write!(
                f,
                "{}:[{} <= {}] yes={},no={},impurity={},cover={}",
                self.num,
                self.split_feature,
                self.split_value,
                self.left_child,
                self.right_child,
                self.impurity,
                self.cover
            )
        }
    }
}
