//! Application state shared across handlers

use crate::auth::{TokenIssuer, UserStore};
use crate::data::DatasetStore;
use crate::model::ModelSlot;
use crate::notify::Notifier;
use crate::predict::PredictionLog;
use crate::remote::RemoteStore;
use tokio::sync::Mutex;

use super::ServerConfig;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub users: UserStore,
    pub tokens: TokenIssuer,
    pub datasets: DatasetStore,
    pub models: ModelSlot,
    /// One retrain in flight at a time; concurrent requests are
    /// rejected rather than racing on the model swap.
    pub train_guard: Mutex<()>,
    pub predictions: PredictionLog,
    pub notifier: Notifier,
    pub remote: RemoteStore,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let users = UserStore::open(config.state_dir.join("users.json"));
        let tokens = TokenIssuer::new(config.jwt_secret.clone());
        let datasets = DatasetStore::new(config.data_dir.clone());
        let predictions = PredictionLog::open(config.state_dir.join("predictions.json"));
        let notifier = Notifier::from_env(
            config.state_dir.join("email_reports.json"),
            config.state_dir.join("email_outbox.txt"),
        );
        let remote = RemoteStore::from_env();

        Self {
            config,
            users,
            tokens,
            datasets,
            models: ModelSlot::empty(),
            train_guard: Mutex::new(()),
            predictions,
            notifier,
            remote,
        }
    }
}
