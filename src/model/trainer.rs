//! Training routine
//!
//! Drops rows with a missing target, performs a seeded shuffled
//! train/test split, fits the feature pipeline and forest on the train
//! split, and evaluates RMSE/R² on both splits. Deterministic for a
//! fixed seed and dataset.

use crate::error::{ClaimsightError, Result};
use crate::model::artifact::{ModelArtifact, TrainingMetadata};
use crate::model::forest::RandomForestRegressor;
use crate::model::metrics::RegressionMetrics;
use crate::preprocessing::{numeric_column, FeaturePipeline, TARGET_COLUMN};
use chrono::Utc;
use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::info;

/// Minimum usable rows after dropping missing targets.
const MIN_TRAINING_ROWS: usize = 10;

/// Configuration for a training run
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainConfig {
    pub fn with_n_trees(mut self, n: usize) -> Self {
        self.n_trees = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Train a new model artifact from a dataset frame.
pub fn train(df: &DataFrame, config: &TrainConfig) -> Result<ModelArtifact> {
    let start = Instant::now();

    let df = drop_missing_target(df)?;
    let n = df.height();
    if n < MIN_TRAINING_ROWS {
        return Err(ClaimsightError::Training(format!(
            "dataset has only {} usable rows, need at least {}",
            n, MIN_TRAINING_ROWS
        )));
    }

    let (train_df, test_df) = split(&df, config)?;

    let mut pipeline = FeaturePipeline::new();
    let x_train = pipeline.fit_transform(&train_df)?;
    let x_test = pipeline.transform(&test_df)?;

    let y_train = target_values(&train_df)?;
    let y_test = target_values(&test_df)?;

    let mut forest = RandomForestRegressor::new(config.n_trees)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_random_state(config.seed);
    forest.fit(&x_train, &y_train)?;

    let train_metrics = RegressionMetrics::compute(&y_train, &forest.predict(&x_train)?);
    let test_metrics = RegressionMetrics::compute(&y_test, &forest.predict(&x_test)?);

    let metadata = TrainingMetadata {
        training_date: Utc::now(),
        training_samples: y_train.len(),
        test_samples: y_test.len(),
        train_rmse: train_metrics.rmse,
        test_rmse: test_metrics.rmse,
        train_r2: train_metrics.r2,
        test_r2: test_metrics.r2,
        features: pipeline.feature_names(),
        model_type: "RandomForestRegressor".to_string(),
        training_time_seconds: start.elapsed().as_secs_f64(),
    };

    info!(
        training_samples = metadata.training_samples,
        test_samples = metadata.test_samples,
        test_rmse = metadata.test_rmse,
        test_r2 = metadata.test_r2,
        elapsed_secs = metadata.training_time_seconds,
        "Model training completed"
    );

    Ok(ModelArtifact {
        pipeline,
        forest,
        metadata,
    })
}

/// Remove rows whose target is null or non-finite.
fn drop_missing_target(df: &DataFrame) -> Result<DataFrame> {
    let target = numeric_column(df, TARGET_COLUMN)?;
    let keep: Vec<bool> = target.iter().map(|v| v.is_some()).collect();
    if keep.iter().all(|k| *k) {
        return Ok(df.clone());
    }
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Seeded shuffled train/test split.
fn split(df: &DataFrame, config: &TrainConfig) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    let mut indices: Vec<u32> = (0..n as u32).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);

    let test_n = ((n as f64 * config.test_fraction).round() as usize).clamp(1, n - 1);
    let (test_idx, train_idx) = indices.split_at(test_n);

    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    let test = df.take(&IdxCa::from_vec("idx".into(), test_idx.to_vec()))?;
    Ok((train, test))
}

fn target_values(df: &DataFrame) -> Result<Array1<f64>> {
    let values = numeric_column(df, TARGET_COLUMN)?;
    Ok(Array1::from_vec(
        values.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
    ))
}
