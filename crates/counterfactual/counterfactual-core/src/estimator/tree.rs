//! CART regression tree with squared-error splits.
//!
//! Array-based representation: nodes live in one vector and reference their
//! children by index. Samples whose split feature is `NaN` are routed to the
//! right child, both while fitting and while predicting.

use counterfactual_spi::FeatureMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn (without replacement) at every split.
    pub max_features: usize,
}

/// A node in the regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        /// Values `<= threshold` go left.
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (repeats allowed).
    pub fn fit<R: Rng>(
        x: &FeatureMatrix,
        y: &[f64],
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut stack: Vec<(usize, Vec<usize>, usize)> = Vec::new();

        nodes.push(leaf(y, &samples));
        stack.push((0, samples, 0));

        while let Some((node_idx, samples, depth)) = stack.pop() {
            if !splittable(y, &samples, depth, params) {
                continue;
            }

            let Some(best) = best_split(x, y, &samples, params, rng) else {
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&i| x.get(i, best.feature) <= best.threshold);

            let left = nodes.len();
            nodes.push(leaf(y, &left_samples));
            let right = nodes.len();
            nodes.push(leaf(y, &right_samples));

            nodes[node_idx] = TreeNode::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };

            stack.push((left, left_samples, depth + 1));
            stack.push((right, right_samples, depth + 1));
        }

        Self {
            nodes,
            n_features: x.n_cols(),
        }
    }

    /// Predict a single observation.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // NaN compares false and goes right
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx] {
                TreeNode::Leaf { .. } => max_depth = max_depth.max(depth),
                TreeNode::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max_depth
    }
}

fn leaf(y: &[f64], samples: &[usize]) -> TreeNode {
    let n = samples.len();
    let value = if n == 0 {
        0.0
    } else {
        samples.iter().map(|&i| y[i]).sum::<f64>() / n as f64
    };
    TreeNode::Leaf {
        value,
        n_samples: n,
    }
}

fn splittable(y: &[f64], samples: &[usize], depth: usize, params: &TreeParams) -> bool {
    let n = samples.len();
    if n < params.min_samples_split || n < 2 * params.min_samples_leaf {
        return false;
    }
    if params.max_depth.is_some_and(|d| depth >= d) {
        return false;
    }
    let first = y[samples[0]];
    samples.iter().any(|&i| y[i] != first)
}

/// Best squared-error split over a random subset of features.
///
/// Minimizing the children's summed squared error is equivalent to
/// maximizing `sum_l² / n_l + sum_r² / n_r`.
fn best_split<R: Rng>(
    x: &FeatureMatrix,
    y: &[f64],
    samples: &[usize],
    params: &TreeParams,
    rng: &mut R,
) -> Option<BestSplit> {
    let n = samples.len();
    let n_features = x.n_cols();
    let k = params.max_features.clamp(1, n_features.max(1));
    let candidates = rand::seq::index::sample(rng, n_features, k);

    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<BestSplit> = None;
    let mut values: Vec<(f64, f64)> = Vec::with_capacity(n);

    for feature in candidates.iter() {
        values.clear();
        for &i in samples {
            let v = x.get(i, feature);
            if !v.is_nan() {
                values.push((v, y[i]));
            }
        }
        let m = values.len();
        if m == 0 {
            continue;
        }
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for split in 1..=m {
            left_sum += values[split - 1].1;

            // split == m sends every non-missing value left and the NaNs right
            let at_end = split == m;
            if at_end && m == n {
                break;
            }
            if !at_end && values[split - 1].0 == values[split].0 {
                continue;
            }

            let n_left = split;
            let n_right = n - split;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if score <= parent_score + 1e-12 * parent_score.abs().max(1.0) {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                let threshold = if at_end {
                    values[m - 1].0
                } else {
                    midpoint(values[split - 1].0, values[split].0)
                };
                best = Some(BestSplit {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

/// Threshold between two adjacent sorted values, never equal to the upper one.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        }
    }

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        (FeatureMatrix::from_rows(vec!["a".into()], &rows).unwrap(), y)
    }

    #[test]
    fn test_fits_step_function() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &params(), &mut rng);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[3.0]), 1.0);
        assert_eq!(tree.predict_row(&[15.0]), 5.0);
        assert_eq!(tree.predict_row(&[9.5]), 1.0);
        assert_eq!(tree.predict_row(&[9.6]), 5.0);
    }

    #[test]
    fn test_max_depth_zero_is_mean() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let p = TreeParams {
            max_depth: Some(0),
            ..params()
        };
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &p, &mut rng);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(&[0.0]), 3.0);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let p = TreeParams {
            min_samples_leaf: 15,
            ..params()
        };
        // No split leaves 15 rows on both sides of 20
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &p, &mut rng);
        assert_eq!(tree.n_nodes(), 1);
    }

    #[test]
    fn test_nan_routed_right() {
        let rows = vec![vec![1.0], vec![2.0], vec![f64::NAN], vec![f64::NAN]];
        let y = vec![0.0, 0.0, 10.0, 10.0];
        let x = FeatureMatrix::from_rows(vec!["a".into()], &rows).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..4).collect(), &params(), &mut rng);

        assert_eq!(tree.predict_row(&[1.5]), 0.0);
        assert_eq!(tree.predict_row(&[f64::NAN]), 10.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let (x, _) = step_data();
        let y = vec![2.0; 20];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &params(), &mut rng);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(&[7.0]), 2.0);
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(1.0, 3.0), 2.0);
        assert_eq!(midpoint(1.0, 1.0 + f64::EPSILON), 1.0);
    }
}
