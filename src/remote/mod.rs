//! Remote table mirror (PostgREST)
//!
//! When `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY` are set,
//! prediction records and email reports are mirrored to remote tables.
//! Mirroring is best-effort: the local files stay authoritative and a
//! remote failure degrades to a warning, never a request failure.

use crate::error::{ClaimsightError, Result};
use crate::notify::EmailReport;
use crate::predict::PredictionRecord;
use serde_json::json;
use tracing::{debug, warn};

/// Minimal PostgREST table client
#[derive(Clone)]
pub struct TableClient {
    base_url: String,
    service_key: String,
    http: reqwest::Client,
}

impl TableClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Build from the environment; None when the toggle is absent.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty())?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self::new(url, key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Insert one row into a table.
    pub async fn insert(&self, table: &str, row: &serde_json::Value) -> Result<()> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| ClaimsightError::Data(format!("remote insert failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClaimsightError::Data(format!(
                "remote insert into {} returned {}",
                table,
                response.status()
            )))
        }
    }

    /// Select rows where `column = value`.
    pub async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<serde_json::Value>> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(&[(column, format!("eq.{}", value)), ("select", "*".to_string())])
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .send()
            .await
            .map_err(|e| ClaimsightError::Data(format!("remote select failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClaimsightError::Data(format!(
                "remote select from {} returned {}",
                table,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClaimsightError::Data(format!("remote select decode failed: {}", e)))
    }
}

/// Best-effort mirror of append-only records to remote tables
pub struct RemoteStore {
    client: Option<TableClient>,
}

impl RemoteStore {
    pub fn new(client: Option<TableClient>) -> Self {
        Self { client }
    }

    pub fn from_env() -> Self {
        Self::new(TableClient::from_env())
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Mirror a prediction record to the `predictions` table.
    pub async fn mirror_prediction(&self, record: &PredictionRecord) {
        let Some(client) = &self.client else {
            return;
        };
        let row = json!({
            "user_email": record.user_email,
            "input_data": record.input_data,
            "prediction": record.prediction,
            "confidence": record.confidence,
            "created_at": record.created_at,
        });
        match client.insert("predictions", &row).await {
            Ok(()) => debug!(user = %record.user_email, "Prediction mirrored to remote store"),
            Err(e) => warn!(error = %e, "Prediction mirror failed, local record kept"),
        }
    }

    /// Mirror an email report to the `email_reports` table.
    pub async fn mirror_email_report(&self, report: &EmailReport) {
        let Some(client) = &self.client else {
            return;
        };
        let row = json!({
            "recipient": report.recipient,
            "prediction": report.prediction,
            "confidence": report.confidence,
            "patient_data": report.patient_data,
            "status": report.status,
            "detail": report.detail,
            "created_at": report.created_at,
        });
        match client.insert("email_reports", &row).await {
            Ok(()) => debug!(recipient = %report.recipient, "Email report mirrored to remote store"),
            Err(e) => warn!(error = %e, "Email report mirror failed, local record kept"),
        }
    }
}
