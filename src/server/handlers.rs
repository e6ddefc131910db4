//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ClaimsightError;
use crate::model::{train, ModelArtifact};
use crate::notify::EmailReport;
use crate::predict::{predict_claim, ClaimFeatures, PredictionRecord};
use crate::stats;

use super::error::{ApiError, ApiResult};
use super::extract::{AdminUser, AuthUser};
use super::state::AppState;

// ============================================================================
// Service info
// ============================================================================

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Claimsight insurance claim prediction API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.models.is_loaded().await,
    }))
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let profile = state.users.signup(&payload.email, &payload.password)?;
    info!(email = %profile.email, "User registered");
    Ok(Json(json!({
        "message": "User created successfully",
        "email": profile.email,
    })))
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub email: String,
    pub is_admin: bool,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let profile = state.users.authenticate(&form.username, &form.password)?;
    let token = state.tokens.create_token(&profile.email, profile.is_admin)?;
    info!(email = %profile.email, "User logged in");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        email: profile.email,
        is_admin: profile.is_admin,
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let profile = state.users.get(&user.email);
    Ok(Json(json!({
        "email": user.email,
        "created_at": profile.as_ref().map(|p| p.created_at),
        "is_admin": profile.map(|p| p.is_admin).unwrap_or(user.is_admin),
    })))
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Deserialize)]
pub struct PredictRequest {
    pub age: f64,
    pub bmi: f64,
    pub gender: String,
    pub smoker: String,
    pub region: String,
    pub premium_annual_inr: Option<f64>,
    /// Optional recipient for a best-effort emailed copy of the result.
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
    pub confidence: f64,
    pub input_data: ClaimFeatures,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<PredictRequest>,
) -> ApiResult<Json<PredictResponse>> {
    let artifact = state
        .models
        .snapshot()
        .await
        .ok_or(ClaimsightError::ModelNotLoaded)?;

    let features = ClaimFeatures {
        age: payload.age,
        bmi: payload.bmi,
        gender: payload.gender,
        smoker: payload.smoker,
        region: payload.region,
        premium_annual_inr: Some(payload.premium_annual_inr.unwrap_or(0.0)),
    };

    let outcome = predict_claim(&artifact, &features)?;

    // Record the prediction best-effort: storage failure never blocks
    // or fails the response.
    let record = PredictionRecord {
        user_email: user.email.clone(),
        input_data: features.clone(),
        prediction: outcome.prediction,
        confidence: outcome.confidence,
        created_at: Utc::now(),
    };
    state.predictions.append(record.clone());
    if state.remote.enabled() {
        let remote_state = state.clone();
        tokio::spawn(async move {
            remote_state.remote.mirror_prediction(&record).await;
        });
    }

    if let Some(recipient) = payload.email {
        let email_state = state.clone();
        let email_features = features.clone();
        tokio::spawn(async move {
            if let Err(e) = email_state
                .notifier
                .send_prediction_report(&recipient, &outcome, &email_features)
                .await
            {
                warn!(recipient = %recipient, error = %e, "Best-effort prediction email failed");
            }
        });
    }

    Ok(Json(PredictResponse {
        prediction: outcome.prediction,
        confidence: outcome.confidence,
        input_data: features,
    }))
}

// ============================================================================
// Statistics
// ============================================================================

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<stats::DatasetStats>> {
    let df = state.datasets.load_latest()?;
    Ok(Json(stats::global_stats(&df)?))
}

pub async fn get_live_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<stats::DatasetStats>> {
    let df = state
        .datasets
        .snapshot_with_predictions(&state.predictions.all())?;
    Ok(Json(stats::global_stats(&df)?))
}

pub async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<stats::DatasetStats>> {
    let records = state.predictions.for_user(&user.email);
    Ok(Json(stats::user_stats(&records)?))
}

pub async fn get_claims_analysis(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<stats::ClaimsAnalysis>> {
    let df = state.datasets.load_latest()?;
    Ok(Json(stats::claims_analysis(&df)?))
}

pub async fn get_live_claims_analysis(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<stats::ClaimsAnalysis>> {
    let df = state
        .datasets
        .snapshot_with_predictions(&state.predictions.all())?;
    Ok(Json(stats::claims_analysis(&df)?))
}

pub async fn get_user_claims_analysis(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<stats::ClaimsAnalysis>> {
    let records = state.predictions.for_user(&user.email);
    Ok(Json(stats::user_claims_analysis(&records)?))
}

// ============================================================================
// Model info
// ============================================================================

pub async fn model_info(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(artifact) = state.models.snapshot().await else {
        return Ok(Json(json!({ "status": "No model loaded" })));
    };

    let mut info = serde_json::to_value(&artifact.metadata)
        .map_err(ClaimsightError::from)?;
    if let Some(map) = info.as_object_mut() {
        map.insert("status".to_string(), json!("Model loaded"));
        map.insert(
            "feature_importance".to_string(),
            json!(artifact.feature_importance_map()),
        );
        map.insert("n_estimators".to_string(), json!(artifact.forest.n_trees()));
    }
    Ok(Json(info))
}

pub async fn model_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.models.snapshot().await {
        None => Json(json!({
            "status": "No model loaded",
            "model_loaded": false,
        })),
        Some(artifact) => Json(json!({
            "status": "Model loaded",
            "model_loaded": true,
            "timestamp": Utc::now(),
            "training_date": artifact.metadata.training_date,
            "model_type": artifact.metadata.model_type,
            "training_time_seconds": artifact.metadata.training_time_seconds,
        })),
    }
}

// ============================================================================
// Admin: upload & retrain
// ============================================================================

pub async fn admin_upload(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut uploaded = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ClaimsightError::InvalidRequest(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ClaimsightError::InvalidRequest(e.to_string()))?;
        uploaded = Some(state.datasets.upload(&bytes, &filename)?);
        break;
    }

    let uploaded = uploaded
        .ok_or_else(|| ClaimsightError::InvalidRequest("No file uploaded".to_string()))?;
    info!(
        admin = %admin.0.email,
        filename = %uploaded.filename,
        rows = uploaded.rows,
        "Dataset uploaded, retraining"
    );

    // Retrain synchronously with the new dataset. The file is kept even
    // if training fails, so an admin can retrain later.
    match retrain_and_install(&state).await {
        Ok(artifact) => Ok(Json(json!({
            "message": format!(
                "File uploaded successfully and model retrained. Dataset has {} rows.",
                uploaded.rows
            ),
            "dataset_rows": uploaded.rows,
            "filename": uploaded.filename,
            "training_completed": true,
            "test_rmse": artifact.metadata.test_rmse,
            "test_r2": artifact.metadata.test_r2,
        }))),
        Err(ApiError(ClaimsightError::RetrainInProgress)) => {
            Err(ApiError(ClaimsightError::RetrainInProgress))
        }
        Err(ApiError(e)) => {
            warn!(error = %e, "Upload succeeded but training failed");
            Ok(Json(json!({
                "message": format!("File uploaded but model training failed: {}", e),
                "dataset_rows": uploaded.rows,
                "filename": uploaded.filename,
                "training_completed": false,
            })))
        }
    }
}

pub async fn admin_retrain(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> ApiResult<Json<serde_json::Value>> {
    let artifact = retrain_and_install(&state).await?;
    info!(admin = %admin.0.email, "Model retrained");
    Ok(Json(json!({
        "message": "Model retrained successfully",
        "training_samples": artifact.metadata.training_samples,
        "test_rmse": artifact.metadata.test_rmse,
        "test_r2": artifact.metadata.test_r2,
        "training_time_seconds": artifact.metadata.training_time_seconds,
    })))
}

/// Train from the current dataset and swap the active model. Guarded so
/// only one retrain runs at a time; a concurrent request gets a 409.
async fn retrain_and_install(state: &Arc<AppState>) -> ApiResult<Arc<ModelArtifact>> {
    let _guard = state
        .train_guard
        .try_lock()
        .map_err(|_| ClaimsightError::RetrainInProgress)?;

    let df = state.datasets.load_latest()?;
    let config = state.config.train_config.clone();
    let models_dir = state.config.models_dir.clone();

    let artifact = tokio::task::spawn_blocking(move || {
        let artifact = train(&df, &config)?;
        artifact.save(&models_dir)?;
        Ok::<_, ClaimsightError>(artifact)
    })
    .await
    .map_err(|e| ClaimsightError::Training(format!("training task failed: {}", e)))??;

    let artifact = Arc::new(artifact);
    state.models.install(artifact.clone()).await;
    Ok(artifact)
}

// ============================================================================
// Email reports
// ============================================================================

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
    pub prediction: PredictionPayload,
    pub patient_data: ClaimFeatures,
}

#[derive(Deserialize)]
pub struct PredictionPayload {
    pub prediction: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

pub async fn send_prediction_email(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = crate::predict::PredictionOutcome {
        prediction: payload.prediction.prediction,
        confidence: payload.prediction.confidence,
    };

    let result = state
        .notifier
        .send_prediction_report(&payload.email, &outcome, &payload.patient_data)
        .await?;

    if state.remote.enabled() {
        let report = EmailReport {
            recipient: payload.email.clone(),
            prediction: outcome.prediction,
            confidence: outcome.confidence,
            patient_data: payload.patient_data.clone(),
            status: result.status,
            detail: result.message.clone(),
            attempts: result.attempts,
            created_at: Utc::now(),
        };
        let remote_state = state.clone();
        tokio::spawn(async move {
            remote_state.remote.mirror_email_report(&report).await;
        });
    }

    // The success flag reflects actual delivery, never just the local
    // audit record.
    Ok(Json(json!({
        "success": result.succeeded(),
        "message": result.message,
    })))
}
