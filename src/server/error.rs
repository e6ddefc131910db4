//! HTTP error mapping

use crate::error::ClaimsightError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Server-facing error wrapper mapping the core taxonomy to statuses
#[derive(Debug)]
pub struct ApiError(pub ClaimsightError);

impl From<ClaimsightError> for ApiError {
    fn from(err: ClaimsightError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ClaimsightError::InvalidCredentials
            | ClaimsightError::TokenExpired
            | ClaimsightError::TokenInvalid(_) => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            ClaimsightError::AdminRequired => (StatusCode::FORBIDDEN, self.0.to_string()),
            ClaimsightError::MissingColumns(_)
            | ClaimsightError::InvalidEmailFormat(_)
            | ClaimsightError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ClaimsightError::NoDataset => (
                StatusCode::NOT_FOUND,
                "No dataset found. Please upload a dataset first.".to_string(),
            ),
            ClaimsightError::RetrainInProgress => (StatusCode::CONFLICT, self.0.to_string()),
            ClaimsightError::ModelNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Model not loaded. Please train the model first.".to_string(),
            ),
            ClaimsightError::Training(detail) => {
                tracing::error!(detail = %detail, "Training error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Training failed. Check server logs for details.".to_string(),
                )
            }
            ClaimsightError::Prediction(detail) => {
                tracing::error!(detail = %detail, "Prediction error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Prediction failed. Check your input values.".to_string(),
                )
            }
            ClaimsightError::Delivery(detail) => {
                tracing::error!(detail = %detail, "Delivery error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Email delivery failed.".to_string(),
                )
            }
            ClaimsightError::Data(detail)
            | ClaimsightError::Serialization(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ClaimsightError::Io(e) => {
                tracing::error!(detail = %e, "IO error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A file system error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ClaimsightError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ClaimsightError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ClaimsightError::AdminRequired),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ClaimsightError::MissingColumns(vec!["age".into()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ClaimsightError::NoDataset), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ClaimsightError::RetrainInProgress),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ClaimsightError::ModelNotLoaded),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ClaimsightError::Training("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
