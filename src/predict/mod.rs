//! Prediction service and prediction history
//!
//! Predictions are served from an artifact snapshot taken at call
//! start. The returned estimate is clamped non-negative and paired with
//! a heuristic confidence derived from per-tree variance. The
//! confidence is an ad-hoc uncertainty proxy, not a calibrated
//! interval.

use crate::error::{ClaimsightError, Result};
use crate::model::ModelArtifact;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Most recent records kept in the prediction log.
const MAX_RECORDS: usize = 1000;

/// Input features for one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimFeatures {
    pub age: f64,
    pub bmi: f64,
    pub gender: String,
    pub smoker: String,
    pub region: String,
    pub premium_annual_inr: Option<f64>,
}

impl ClaimFeatures {
    /// Build a single-row frame matching the training schema.
    /// A missing premium falls back to 0, as the original inputs did.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        DataFrame::new(vec![
            Column::new("age".into(), &[self.age]),
            Column::new("bmi".into(), &[self.bmi]),
            Column::new("gender".into(), &[self.gender.as_str()]),
            Column::new("smoker".into(), &[self.smoker.as_str()]),
            Column::new("region".into(), &[self.region.as_str()]),
            Column::new(
                "premium_annual_inr".into(),
                &[self.premium_annual_inr.unwrap_or(0.0)],
            ),
        ])
        .map_err(|e| ClaimsightError::Prediction(e.to_string()))
    }

    pub fn premium_or_default(&self) -> f64 {
        self.premium_annual_inr.unwrap_or(0.0)
    }
}

/// A served prediction with its confidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: f64,
    pub confidence: f64,
}

/// Run one prediction against an artifact snapshot.
pub fn predict_claim(artifact: &ModelArtifact, features: &ClaimFeatures) -> Result<PredictionOutcome> {
    let df = features.to_dataframe()?;
    let matrix = artifact.pipeline.transform(&df)?;
    let row = matrix.row(0);

    let per_tree = artifact.forest.tree_predictions(row)?;
    let outcome = if per_tree.is_empty() {
        PredictionOutcome {
            prediction: 0.0,
            confidence: 0.5,
        }
    } else {
        let n = per_tree.len() as f64;
        let mean = per_tree.iter().sum::<f64>() / n;
        let variance = per_tree.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let confidence = 1.0 / (1.0 + variance.sqrt());
        PredictionOutcome {
            prediction: mean.max(0.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    };

    Ok(outcome)
}

/// One logged prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub user_email: String,
    pub input_data: ClaimFeatures,
    pub prediction: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// File-backed prediction history, capped at the most recent 1000
/// records. Appends are best-effort: a persistence failure is logged
/// and never surfaced to the prediction caller.
pub struct PredictionLog {
    path: PathBuf,
    records: RwLock<Vec<PredictionRecord>>,
}

impl PredictionLog {
    /// Open the log, loading any existing records file.
    pub fn open(path: PathBuf) -> Self {
        let records = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse predictions file, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            records: RwLock::new(records),
        }
    }

    /// Append a record, trimming to the retention cap, and persist.
    pub fn append(&self, record: PredictionRecord) {
        let snapshot = {
            let mut records = self.records.write();
            records.push(record);
            let len = records.len();
            if len > MAX_RECORDS {
                records.drain(0..len - MAX_RECORDS);
            }
            records.clone()
        };

        if let Err(e) = self.persist(&snapshot) {
            warn!(path = %self.path.display(), error = %e, "Could not persist prediction record");
        }
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<PredictionRecord> {
        self.records.read().clone()
    }

    /// Records for one user, oldest first.
    pub fn for_user(&self, email: &str) -> Vec<PredictionRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.user_email == email)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn persist(&self, records: &[PredictionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(records)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{train, TrainConfig};

    fn sample_features() -> ClaimFeatures {
        ClaimFeatures {
            age: 30.0,
            bmi: 25.0,
            gender: "Male".to_string(),
            smoker: "No".to_string(),
            region: "North".to_string(),
            premium_annual_inr: Some(15000.0),
        }
    }

    fn training_frame() -> DataFrame {
        let n = 50;
        let ages: Vec<f64> = (0..n).map(|i| 20.0 + (i % 40) as f64).collect();
        let bmis: Vec<f64> = (0..n).map(|i| 19.0 + (i % 14) as f64).collect();
        let genders: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect();
        let smokers: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "Yes" } else { "No" }).collect();
        let regions: Vec<&str> = (0..n)
            .map(|i| ["North", "South", "East", "West"][i % 4])
            .collect();
        let premiums: Vec<f64> = (0..n).map(|i| 12000.0 + 800.0 * (i % 10) as f64).collect();
        let claims: Vec<f64> = (0..n)
            .map(|i| 300.0 * ages[i] + if i % 3 == 0 { 25000.0 } else { 0.0 })
            .collect();

        DataFrame::new(vec![
            Column::new("age".into(), ages),
            Column::new("bmi".into(), bmis),
            Column::new("gender".into(), genders),
            Column::new("smoker".into(), smokers),
            Column::new("region".into(), regions),
            Column::new("premium_annual_inr".into(), premiums),
            Column::new("claim_amount_inr".into(), claims),
        ])
        .unwrap()
    }

    #[test]
    fn test_prediction_is_non_negative_with_bounded_confidence() {
        let artifact = train(&training_frame(), &TrainConfig::default().with_n_trees(10)).unwrap();
        let outcome = predict_claim(&artifact, &sample_features()).unwrap();

        assert!(outcome.prediction >= 0.0);
        assert!((0.0..=1.0).contains(&outcome.confidence));
    }

    #[test]
    fn test_unseen_region_still_predicts() {
        let artifact = train(&training_frame(), &TrainConfig::default().with_n_trees(10)).unwrap();
        let mut features = sample_features();
        features.region = "Central".to_string();

        let outcome = predict_claim(&artifact, &features).unwrap();
        assert!(outcome.prediction >= 0.0);
    }

    #[test]
    fn test_log_caps_at_retention_limit() {
        let dir = tempfile::tempdir().unwrap();
        let log = PredictionLog::open(dir.path().join("predictions.json"));

        for i in 0..(MAX_RECORDS + 10) {
            log.append(PredictionRecord {
                user_email: format!("u{}@example.com", i),
                input_data: sample_features(),
                prediction: i as f64,
                confidence: 0.5,
                created_at: Utc::now(),
            });
        }

        assert_eq!(log.len(), MAX_RECORDS);
        // Oldest entries were dropped.
        assert_eq!(log.all().first().unwrap().prediction, 10.0);
    }

    #[test]
    fn test_log_filters_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let log = PredictionLog::open(dir.path().join("predictions.json"));

        for email in ["a@example.com", "b@example.com", "a@example.com"] {
            log.append(PredictionRecord {
                user_email: email.to_string(),
                input_data: sample_features(),
                prediction: 100.0,
                confidence: 0.5,
                created_at: Utc::now(),
            });
        }

        assert_eq!(log.for_user("a@example.com").len(), 2);
        assert_eq!(log.for_user("c@example.com").len(), 0);
    }

    #[test]
    fn test_log_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.json");

        {
            let log = PredictionLog::open(path.clone());
            log.append(PredictionRecord {
                user_email: "a@example.com".to_string(),
                input_data: sample_features(),
                prediction: 100.0,
                confidence: 0.5,
                created_at: Utc::now(),
            });
        }

        let reloaded = PredictionLog::open(path);
        assert_eq!(reloaded.len(), 1);
    }
}
