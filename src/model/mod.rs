//! Model training, evaluation, and artifact management
//!
//! One pipeline definition: standard preprocessing feeding a random
//! forest regressor, with a seeded deterministic training routine and
//! an atomically swapped artifact slot for serving.

pub mod artifact;
pub mod decision_tree;
pub mod forest;
pub mod metrics;
pub mod trainer;

pub use artifact::{ModelArtifact, ModelSlot, TrainingMetadata, ARTIFACT_FILE, METADATA_FILE};
pub use decision_tree::{RegressionTree, TreeNode};
pub use forest::RandomForestRegressor;
pub use metrics::RegressionMetrics;
pub use trainer::{train, TrainConfig};
