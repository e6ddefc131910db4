//! API route definitions

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Check /health for API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

/// Build the CORS layer from the configured origin list. An empty list
/// or a `*` entry allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() || origins.iter().any(|o| o == "*") || exact.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(exact))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let max_upload = state.config.max_upload_size;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Auth
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::me))
        // Prediction
        .route("/predict", post(handlers::predict))
        // Statistics
        .route("/stats", get(handlers::get_stats))
        .route("/live-stats", get(handlers::get_live_stats))
        .route("/user-stats", get(handlers::get_user_stats))
        .route("/claims-analysis", get(handlers::get_claims_analysis))
        .route("/live-claims-analysis", get(handlers::get_live_claims_analysis))
        .route("/user-claims-analysis", get(handlers::get_user_claims_analysis))
        // Model
        .route("/model-info", get(handlers::model_info))
        .route("/model-status", get(handlers::model_status))
        // Admin
        .route("/admin/upload", post(handlers::admin_upload))
        .route("/admin/retrain", post(handlers::admin_retrain))
        // Email reports
        .route("/send-prediction-email", post(handlers::send_prediction_email))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
