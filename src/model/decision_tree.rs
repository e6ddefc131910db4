//! Regression tree
//!
//! Variance-reduction splitting with prefix-sum threshold scanning.
//! Feature subsets are sampled per split from the caller's RNG so a
//! forest built from seeded RNGs is fully reproducible.

use crate::error::{ClaimsightError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Regression tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features considered per split (None = all)
    pub max_features: Option<usize>,
    n_features: usize,
    feature_importances: Option<Vec<f64>>,
}

impl RegressionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Fit the tree. The RNG drives per-split feature subsampling.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut ChaCha8Rng) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ClaimsightError::Training(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(ClaimsightError::Training("empty training split".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build(x, y, &indices, 0, rng, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(importances);

        Ok(self)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let leaf_value = || {
            let sum: f64 = indices.iter().map(|&i| y[i]).sum();
            sum / n_samples as f64
        };

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.map_or(false, |d| depth >= d)
            || Self::is_pure(y, indices);

        if should_stop {
            return TreeNode::Leaf {
                value: leaf_value(),
                n_samples,
            };
        }

        if let Some((feature_idx, threshold, gain)) = self.best_split(x, y, indices, rng) {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, feature_idx]] <= threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    value: leaf_value(),
                    n_samples,
                };
            }

            importances[feature_idx] += n_samples as f64 * gain;

            let left = Box::new(self.build(x, y, &left_indices, depth + 1, rng, importances));
            let right = Box::new(self.build(x, y, &right_indices, depth + 1, rng, importances));

            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                n_samples,
            }
        } else {
            TreeNode::Leaf {
                value: leaf_value(),
                n_samples,
            }
        }
    }

    /// Find the best variance-reducing split over a sampled feature
    /// subset. Candidate thresholds are midpoints between consecutive
    /// distinct values; child impurities come from prefix sums.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = sq_sum / n - (sum / n).powi(2);
        if parent_impurity <= 0.0 {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in self.sample_features(rng) {
            let mut pairs: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0f64;
            let mut left_sq_sum = 0.0f64;

            for (i, window) in pairs.windows(2).enumerate() {
                left_sum += window[0].1;
                left_sq_sum += window[0].1 * window[0].1;

                if window[0].0 == window[1].0 {
                    continue;
                }

                let left_count = i + 1;
                let right_count = pairs.len() - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let ln = left_count as f64;
                let rn = right_count as f64;
                let right_sum = sum - left_sum;
                let right_sq_sum = sq_sum - left_sq_sum;

                let left_impurity = left_sq_sum / ln - (left_sum / ln).powi(2);
                let right_impurity = right_sq_sum / rn - (right_sum / rn).powi(2);
                let weighted = (ln * left_impurity + rn * right_impurity) / n;
                let gain = parent_impurity - weighted;

                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    let threshold = (window[0].0 + window[1].0) / 2.0;
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    /// Draw a distinct random subset of feature indices.
    fn sample_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self
            .max_features
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features);
        let mut pool: Vec<usize> = (0..self.n_features).collect();
        for i in 0..k {
            let j = rng.gen_range(i..pool.len());
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }

    fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
        let first = y[indices[0]];
        indices.iter().all(|&i| (y[i] - first).abs() < 1e-10)
    }

    /// Predict all rows of a design matrix.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or(ClaimsightError::ModelNotLoaded)?;
        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| Self::predict_node(root, &x.row(i).to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Predict a single feature row.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let root = self
            .root
            .as_ref()
            .ok_or(ClaimsightError::ModelNotLoaded)?;
        Ok(Self::predict_node(root, row))
    }

    fn predict_node(node: &TreeNode, row: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature_idx] <= *threshold {
                    Self::predict_node(left, row)
                } else {
                    Self::predict_node(right, row)
                }
            }
        }
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map(node_depth).unwrap_or(0)
    }
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_fits_linear_target() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = RegressionTree::new();
        tree.fit(&x, &y, &mut rng).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = RegressionTree::new().with_max_depth(2);
        tree.fit(&x, &y, &mut rng).unwrap();

        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_target_yields_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 5.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = RegressionTree::new();
        tree.fit(&x, &y, &mut rng).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[9.0]).unwrap(), 5.0);
    }

    #[test]
    fn test_feature_importances_favor_informative_feature() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = RegressionTree::new();
        tree.fit(&x, &y, &mut rng).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_empty_input_fails() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tree = RegressionTree::new();
        assert!(tree.fit(&x, &y, &mut rng).is_err());
    }
}
