use crate::data::DenseMatrix;
use crate::errors::{Result, RiskError};
use crate::node::Node;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::max;
use std::fmt::{self, Display};

/// Smallest number of distinct samples a node needs to be split.
const MIN_SAMPLES_SPLIT: usize = 2;

/// A binary CART classification tree grown on weighted Gini impurity.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Tree {
    /// Nodes, indexed by their `num`. The root is node 0.
    pub nodes: Vec<Node>,
    pub depth: usize,
    pub n_leaves: usize,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    child_impurity: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct NodeStats {
    cover: f64,
    weight_value: f64,
    impurity: f64,
}

fn node_stats(samples: &[usize], y: &[u8], sample_weight: &[f64]) -> NodeStats {
    let mut cover = 0.0;
    let mut positive = 0.0;
    for &i in samples {
        cover += sample_weight[i];
        if y[i] == 1 {
            positive += sample_weight[i];
        }
    }
    let p = if cover > 0.0 { positive / cover } else { 0.0 };
    NodeStats {
        cover,
        weight_value: p,
        impurity: gini(p),
    }
}

#[inline]
fn gini(p: f64) -> f64 {
    2.0 * p * (1.0 - p)
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            nodes: Vec::new(),
            depth: 0,
            n_leaves: 0,
        }
    }

    /// Grow the tree until every leaf is pure or cannot be split.
    ///
    /// * `data` - Transformed training rows.
    /// * `y` - Binary labels, aligned with `data` rows.
    /// * `index` - Distinct rows taking part in this tree.
    /// * `sample_weight` - Weight of every row of `data`; rows outside `index` are ignored.
    /// * `max_features` - Number of non-constant features inspected per split.
    pub fn fit(
        &mut self,
        data: &DenseMatrix,
        y: &[u8],
        index: Vec<usize>,
        sample_weight: &[f64],
        max_features: usize,
        rng: &mut StdRng,
    ) {
        self.nodes.clear();
        self.depth = 0;
        self.n_leaves = 1;

        let root = node_stats(&index, y, sample_weight);
        self.nodes
            .push(Node::leaf(0, 0, root.weight_value, root.cover, root.impurity));

        let mut growable: Vec<(usize, Vec<usize>)> = vec![(0, index)];
        let mut features: Vec<usize> = (0..data.cols).collect();

        while let Some((n_idx, samples)) = growable.pop() {
            let node = &self.nodes[n_idx];
            if node.impurity <= 0.0 || samples.len() < MIN_SAMPLES_SPLIT {
                continue;
            }
            let depth = node.depth;

            features.shuffle(rng);
            let Some(split) = best_split(data, y, sample_weight, &samples, &features, max_features) else {
                continue;
            };

            let left_num = self.nodes.len();
            let right_num = left_num + 1;
            let left = node_stats(&split.left, y, sample_weight);
            let right = node_stats(&split.right, y, sample_weight);
            self.nodes[n_idx].make_parent_node(split.feature, split.threshold, left_num, right_num);
            self.nodes
                .push(Node::leaf(left_num, depth + 1, left.weight_value, left.cover, left.impurity));
            self.nodes
                .push(Node::leaf(right_num, depth + 1, right.weight_value, right.cover, right.impurity));
            self.n_leaves += 1;
            self.depth = max(self.depth, depth + 1);

            growable.push((right_num, split.right));
            growable.push((left_num, split.left));
        }
    }

    /// Check the node links of a deserialized tree. Children always come after
    /// their parent, so a valid tree has no cycles.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(RiskError::ArtifactLoadFailure("tree has no nodes".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf {
                continue;
            }
            let linked = |c: usize| c > i && c < self.nodes.len();
            if node.split_feature >= n_features || !linked(node.left_child) || !linked(node.right_child) {
                return Err(RiskError::ArtifactLoadFailure(format!(
                    "node {} splits on feature {} with children {} and {}",
                    i, node.split_feature, node.left_child, node.right_child
                )));
            }
        }
        Ok(())
    }
}

/// Search the shuffled features for the split minimizing the weighted child impurity.
fn best_split(
    data: &DenseMatrix,
    y: &[u8],
    sample_weight: &[f64],
    samples: &[usize],
    features: &[usize],
    max_features: usize,
) -> Option<SplitCandidate> {
    let mut best: Option<(usize, f64, f64)> = None;
    let mut visited = 0;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(samples.len());

    for &feature in features {
        // Keep looking past max_features until at least one valid split exists.
        if visited >= max_features && best.is_some() {
            break;
        }
        sorted.clear();
        sorted.extend(samples.iter().map(|&i| (*data.get(i, feature), i)));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        if sorted[0].0 >= sorted[sorted.len() - 1].0 {
            continue;
        }
        visited += 1;

        let (total, total_pos) = sorted.iter().fold((0.0, 0.0), |(w, p), &(_, i)| {
            let sw = sample_weight[i];
            (w + sw, if y[i] == 1 { p + sw } else { p })
        });

        let mut left_w = 0.0;
        let mut left_pos = 0.0;
        for k in 0..sorted.len() - 1 {
            let (x, i) = sorted[k];
            left_w += sample_weight[i];
            if y[i] == 1 {
                left_pos += sample_weight[i];
            }
            let next = sorted[k + 1].0;
            if x >= next {
                continue;
            }
            let right_w = total - left_w;
            if left_w <= 0.0 || right_w <= 0.0 {
                continue;
            }
            let child = left_w * gini(left_pos / left_w) + right_w * gini((total_pos - left_pos) / right_w);
            if best.map_or(true, |(_, _, b)| child < b) {
                let mut threshold = (x + next) / 2.0;
                if threshold >= next {
                    threshold = x;
                }
                best = Some((feature, threshold, child));
            }
        }
    }

    let (feature, threshold, child_impurity) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .partition(|&&i| *data.get(i, feature) <= threshold);
    Some(SplitCandidate {
        feature,
        threshold,
        child_impurity,
        left,
        right,
    })
    .filter(|s| !s.left.is_empty() && !s.right.is_empty() && s.child_impurity.is_finite())
}

impl Display for Tree {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let Some(node) = self.nodes.get(idx) else {
                continue;
            };
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            if !node.is_leaf {
                print_buffer.push(node.right_child);
                print_buffer.push(node.left_child);
            }
        }
        write!(f, "{}", r)
    }
}
