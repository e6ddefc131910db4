//! Random forest regressor
//!
//! Bootstrap-sampled regression trees fitted in parallel. Each tree
//! derives its RNG from the base seed and its index, so fitting is
//! deterministic regardless of thread scheduling. Per-tree predictions
//! are exposed for the variance-based confidence heuristic.

use crate::error::{ClaimsightError, Result};
use crate::model::decision_tree::RegressionTree;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Vec<f64>>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
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

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest to training data.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
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
        let max_features = ((self.n_features as f64).sqrt().ceil() as usize).max(1);
        let base_seed = self.random_state;

        let trees: Result<Vec<RegressionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                let mut tree = RegressionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features);
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }

                tree.fit(&x_boot, &y_boot, &mut rng)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    if i < self.n_features {
                        totals[i] += val;
                    }
                }
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for imp in &mut totals {
                *imp /= sum;
            }
        }
        self.feature_importances = Some(totals);
    }

    /// Predict all rows: the mean of per-tree predictions.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ClaimsightError::ModelNotLoaded);
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let predictions: Vec<f64> = (0..n_samples)
            .map(|i| per_tree.iter().map(|p| p[i]).sum::<f64>() / per_tree.len() as f64)
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Per-tree predictions for a single feature row.
    pub fn tree_predictions(&self, row: ArrayView1<f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ClaimsightError::ModelNotLoaded);
        }
        let row = row.to_vec();
        self.trees.iter().map(|tree| tree.predict_row(&row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }
}
