//! Error types for the claimsight service

use thiserror::Error;

/// Result type alias for claimsight operations
pub type Result<T> = std::result::Result<T, ClaimsightError>;

/// Main error type for the claimsight service
#[derive(Error, Debug)]
pub enum ClaimsightError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Admin access required")]
    AdminRequired,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("No dataset found")]
    NoDataset,

    #[error("Invalid email format: {0}")]
    InvalidEmailFormat(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Retraining already in progress")]
    RetrainInProgress,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for ClaimsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        ClaimsightError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ClaimsightError {
    fn from(err: serde_json::Error) -> Self {
        ClaimsightError::Serialization(err.to_string())
    }
}
