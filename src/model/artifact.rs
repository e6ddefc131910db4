//! Trained model artifact and the in-process model slot
//!
//! An artifact bundles the fitted feature pipeline, the forest, and the
//! training metadata. On disk it is a single JSON document written via
//! temp-file-then-rename, with the metadata mirrored next to it; a
//! reader never observes a partially written artifact.

use crate::error::{ClaimsightError, Result};
use crate::model::forest::RandomForestRegressor;
use crate::preprocessing::FeaturePipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Artifact file name inside the models directory.
pub const ARTIFACT_FILE: &str = "model_pipeline.json";

/// Metadata file name inside the models directory.
pub const METADATA_FILE: &str = "training_metadata.json";

/// Record describing one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub training_date: DateTime<Utc>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub train_r2: f64,
    pub test_r2: f64,
    pub features: Vec<String>,
    pub model_type: String,
    pub training_time_seconds: f64,
}

/// A fitted pipeline + regressor with its training metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub pipeline: FeaturePipeline,
    pub forest: RandomForestRegressor,
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    /// Persist the artifact and its metadata under the models directory.
    pub fn save(&self, models_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(models_dir)?;
        write_atomic(&models_dir.join(ARTIFACT_FILE), &serde_json::to_vec(self)?)?;
        write_atomic(
            &models_dir.join(METADATA_FILE),
            &serde_json::to_vec_pretty(&self.metadata)?,
        )?;
        Ok(())
    }

    /// Load an artifact from the models directory.
    pub fn load(models_dir: &Path) -> Result<Self> {
        let path = models_dir.join(ARTIFACT_FILE);
        if !path.exists() {
            return Err(ClaimsightError::ModelNotLoaded);
        }
        let bytes = std::fs::read(&path)?;
        let artifact: Self = serde_json::from_slice(&bytes)?;
        Ok(artifact)
    }

    /// Feature importance keyed by design-matrix column name.
    pub fn feature_importance_map(&self) -> BTreeMap<String, f64> {
        let names = self.pipeline.feature_names();
        match self.forest.feature_importances() {
            Some(importances) => names
                .into_iter()
                .zip(importances.iter().copied())
                .collect(),
            None => BTreeMap::new(),
        }
    }
}

/// Write a file via a temp sibling and rename so readers see either the
/// old content or the new, never a torn write.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp: PathBuf = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Single-writer, multi-reader slot holding the active artifact.
///
/// Readers take an `Arc` snapshot at call start and keep using it even
/// if a retrain swaps the slot mid-inference.
pub struct ModelSlot {
    inner: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelSlot {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Snapshot the active artifact, if any.
    pub async fn snapshot(&self) -> Option<Arc<ModelArtifact>> {
        self.inner.read().await.clone()
    }

    /// Replace the active artifact.
    pub async fn install(&self, artifact: Arc<ModelArtifact>) {
        *self.inner.write().await = Some(artifact);
    }

    pub async fn is_loaded(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
