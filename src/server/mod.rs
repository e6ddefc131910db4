//! HTTP server
//!
//! REST API for prediction serving, dataset management, analytics, and
//! email reports.

mod api;
mod error;
mod extract;
mod handlers;
mod state;

pub use api::create_router;
pub use error::{ApiError, ApiResult};
pub use extract::{AdminUser, AuthUser};
pub use state::AppState;

use crate::model::{train, ModelArtifact, TrainConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    /// Directory for users.json, predictions.json, email_reports.json.
    pub state_dir: PathBuf,
    pub max_upload_size: usize,
    pub jwt_secret: String,
    pub allowed_origins: Vec<String>,
    pub train_config: TrainConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            state_dir: std::env::var("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25 * 1024 * 1024),
            jwt_secret: std::env::var("JWT_SECRET_KEY")
                .unwrap_or_else(|_| "claimsight-dev-secret".to_string()),
            allowed_origins,
            train_config: TrainConfig::default(),
        }
    }
}

/// Load the persisted model artifact, or train one from the current
/// dataset if none exists yet. Failures leave the slot empty; the
/// prediction endpoints answer 503 until an admin retrains.
async fn load_or_train_startup_model(state: &Arc<AppState>) {
    match ModelArtifact::load(&state.config.models_dir) {
        Ok(artifact) => {
            info!(
                training_date = %artifact.metadata.training_date,
                test_rmse = artifact.metadata.test_rmse,
                "Loaded persisted model artifact"
            );
            state.models.install(Arc::new(artifact)).await;
            return;
        }
        Err(e) => {
            info!(reason = %e, "No usable persisted model, checking for a dataset");
        }
    }

    let df = match state.datasets.load_latest() {
        Ok(df) => df,
        Err(_) => {
            info!("No dataset available; model will be trained after the first upload");
            return;
        }
    };

    let config = state.config.train_config.clone();
    let models_dir = state.config.models_dir.clone();
    let trained = tokio::task::spawn_blocking(move || {
        let artifact = train(&df, &config)?;
        artifact.save(&models_dir)?;
        Ok::<_, crate::error::ClaimsightError>(artifact)
    })
    .await;

    match trained {
        Ok(Ok(artifact)) => {
            info!(
                test_rmse = artifact.metadata.test_rmse,
                "Trained startup model from the current dataset"
            );
            state.models.install(Arc::new(artifact)).await;
        }
        Ok(Err(e)) => warn!(error = %e, "Startup training failed"),
        Err(e) => warn!(error = %e, "Startup training task failed"),
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.models_dir)?;
    std::fs::create_dir_all(&config.state_dir)?;

    if config.jwt_secret == "claimsight-dev-secret" {
        warn!("JWT_SECRET_KEY not set, using the development secret");
    }

    let state = Arc::new(AppState::new(config.clone()));
    load_or_train_startup_model(&state).await;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        data_dir = %config.data_dir.display(),
        models_dir = %config.models_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Claimsight server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_upload_size, 25 * 1024 * 1024);
        assert_eq!(config.train_config.n_trees, 200);
    }
}
