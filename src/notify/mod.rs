//! Email report delivery
//!
//! A single retry loop under a total timeout budget, one audit record
//! per request, and an honest result: a report that only reached the
//! local audit file is never reported as sent.

mod mailer;
mod template;

pub use mailer::{FileMailer, Mailer, MailerError, OutboundEmail, SmtpMailer};
pub use template::{format_inr, render_report, report_subject};

use crate::error::{ClaimsightError, Result};
use crate::predict::{ClaimFeatures, PredictionOutcome};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};

/// Recipient address pattern (same shape the source system enforced).
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Validate an email address format.
pub fn validate_email(address: &str) -> Result<()> {
    if email_regex().is_match(address) {
        Ok(())
    } else {
        Err(ClaimsightError::InvalidEmailFormat(address.to_string()))
    }
}

/// Delivery lifecycle: a request starts queued and ends in exactly one
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Failed,
    TimedOut,
}

/// Final outcome reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub message: String,
    pub attempts: u32,
}

impl DeliveryResult {
    pub fn succeeded(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

/// Audit record for one delivery request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailReport {
    pub recipient: String,
    pub prediction: f64,
    pub confidence: f64,
    pub patient_data: ClaimFeatures,
    pub status: DeliveryStatus,
    pub detail: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

/// File-backed audit log of email reports
pub struct ReportStore {
    path: PathBuf,
    reports: RwLock<Vec<EmailReport>>,
}

impl ReportStore {
    pub fn open(path: PathBuf) -> Self {
        let reports = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(reports) => reports,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse email reports file, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            reports: RwLock::new(reports),
        }
    }

    /// Append an audit record; persistence failures are logged only.
    pub fn append(&self, report: EmailReport) {
        let snapshot = {
            let mut reports = self.reports.write();
            reports.push(report);
            reports.clone()
        };
        if let Err(e) = self.persist(&snapshot) {
            warn!(path = %self.path.display(), error = %e, "Could not persist email report");
        }
    }

    pub fn all(&self) -> Vec<EmailReport> {
        self.reports.read().clone()
    }

    fn persist(&self, reports: &[EmailReport]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(reports)?)?;
        Ok(())
    }
}

/// Delivery configuration: a single total timeout budget with a bounded
/// retry count and fixed backoff.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub timeout_budget: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            timeout_budget: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl NotifierConfig {
    /// Read overrides from the environment (`EMAIL_TIMEOUT_SECS`,
    /// `EMAIL_MAX_ATTEMPTS`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("EMAIL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout_budget = Duration::from_secs(secs);
        }
        if let Some(attempts) = std::env::var("EMAIL_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.max_attempts = attempts.max(1);
        }
        config
    }
}

/// Prediction report delivery service
pub struct Notifier {
    config: NotifierConfig,
    mailer: Arc<dyn Mailer>,
    reports: ReportStore,
}

impl Notifier {
    pub fn new(config: NotifierConfig, mailer: Arc<dyn Mailer>, reports: ReportStore) -> Self {
        Self {
            config,
            mailer,
            reports,
        }
    }

    /// Build the notifier from relay credentials, falling back to the
    /// local outbox sink when none are configured.
    pub fn from_env(reports_path: PathBuf, outbox_path: PathBuf) -> Self {
        let config = NotifierConfig::from_env();
        let mailer: Arc<dyn Mailer> = match (
            std::env::var("GMAIL_EMAIL").ok().filter(|v| !v.is_empty()),
            std::env::var("GMAIL_APP_PASSWORD").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => {
                let host = std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
                let port = std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(587);
                match SmtpMailer::new(&host, port, email, password) {
                    Ok(mailer) => Arc::new(mailer),
                    Err(e) => {
                        warn!(error = %e, "Could not build SMTP transport, falling back to local outbox");
                        Arc::new(FileMailer::new(outbox_path))
                    }
                }
            }
            _ => {
                info!("Relay credentials not configured, email reports go to the local outbox");
                Arc::new(FileMailer::new(outbox_path))
            }
        };
        Self::new(config, mailer, ReportStore::open(reports_path))
    }

    /// Send a prediction report. Validates the recipient, retries
    /// transient transport failures within the total timeout budget,
    /// records an audit entry, and returns the honest outcome.
    pub async fn send_prediction_report(
        &self,
        recipient: &str,
        outcome: &PredictionOutcome,
        patient: &ClaimFeatures,
    ) -> Result<DeliveryResult> {
        validate_email(recipient)?;

        let now = Utc::now();
        let email = OutboundEmail {
            to: recipient.to_string(),
            subject: report_subject(outcome),
            html_body: render_report(recipient, outcome, patient, now),
        };

        let deadline = Instant::now() + self.config.timeout_budget;
        let max_attempts = self.config.max_attempts.max(1);
        let mut status = DeliveryStatus::Queued;
        let mut detail = String::new();
        let mut attempts = 0u32;

        while attempts < max_attempts {
            attempts += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                status = DeliveryStatus::TimedOut;
                detail = format!(
                    "delivery budget of {:?} exhausted",
                    self.config.timeout_budget
                );
                break;
            }

            match timeout(remaining, self.mailer.send(&email)).await {
                Ok(Ok(())) => {
                    status = DeliveryStatus::Sent;
                    detail = format!("delivered via {}", self.mailer.describe());
                    break;
                }
                Ok(Err(e)) => {
                    detail = e.to_string();
                    status = DeliveryStatus::Failed;
                    let permanent = matches!(e, MailerError::Auth(_) | MailerError::Refused(_));
                    warn!(
                        recipient = recipient,
                        attempt = attempts,
                        error = %e,
                        "Email delivery attempt failed"
                    );
                    if permanent || attempts >= max_attempts {
                        break;
                    }
                    sleep(self.config.retry_backoff).await;
                }
                Err(_) => {
                    status = DeliveryStatus::TimedOut;
                    detail = format!(
                        "delivery timed out after {:?}",
                        self.config.timeout_budget
                    );
                    break;
                }
            }
        }

        self.reports.append(EmailReport {
            recipient: recipient.to_string(),
            prediction: outcome.prediction,
            confidence: outcome.confidence,
            patient_data: patient.clone(),
            status,
            detail: detail.clone(),
            attempts,
            created_at: now,
        });

        let message = match status {
            DeliveryStatus::Sent => format!("Prediction report sent to {}", recipient),
            DeliveryStatus::TimedOut => format!("Email delivery timed out: {}", detail),
            _ => format!("Email delivery failed: {}", detail),
        };

        if status == DeliveryStatus::Sent {
            info!(recipient = recipient, attempts = attempts, "Prediction report delivered");
        }

        Ok(DeliveryResult {
            status,
            message,
            attempts,
        })
    }

    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingMailer {
        calls: AtomicU32,
        error: fn() -> MailerError,
    }

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &OutboundEmail) -> std::result::Result<(), MailerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }

        fn describe(&self) -> &str {
            "failing"
        }
    }

    fn patient() -> ClaimFeatures {
        ClaimFeatures {
            age: 30.0,
            bmi: 25.0,
            gender: "Male".to_string(),
            smoker: "No".to_string(),
            region: "North".to_string(),
            premium_annual_inr: Some(15000.0),
        }
    }

    fn outcome() -> PredictionOutcome {
        PredictionOutcome {
            prediction: 20000.0,
            confidence: 0.8,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("@gmail.com").is_err());
        assert!(validate_email("test@").is_err());
        assert!(validate_email("").is_err());
    }

    #[tokio::test]
    async fn test_file_sink_delivery_reports_sent() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Notifier::new(
            NotifierConfig::default(),
            Arc::new(FileMailer::new(dir.path().join("outbox.txt"))),
            ReportStore::open(dir.path().join("email_reports.json")),
        );

        let result = notifier
            .send_prediction_report("user@example.com", &outcome(), &patient())
            .await
            .unwrap();

        assert!(result.succeeded());
        assert_eq!(result.attempts, 1);
        let reports = notifier.reports().all();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_reports_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FailingMailer {
            calls: AtomicU32::new(0),
            error: || MailerError::Connection("refused".to_string()),
        });
        let config = NotifierConfig {
            timeout_budget: Duration::from_secs(10),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        };
        let notifier = Notifier::new(
            config,
            mailer.clone(),
            ReportStore::open(dir.path().join("email_reports.json")),
        );

        let result = notifier
            .send_prediction_report("user@example.com", &outcome(), &patient())
            .await
            .unwrap();

        // Honest failure: never reported as sent just because the audit
        // record was written.
        assert!(!result.succeeded());
        assert_eq!(result.status, DeliveryStatus::Failed);
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.reports().all()[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn test_auth_failure_does_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FailingMailer {
            calls: AtomicU32::new(0),
            error: || MailerError::Auth("bad credentials".to_string()),
        });
        let notifier = Notifier::new(
            NotifierConfig::default(),
            mailer.clone(),
            ReportStore::open(dir.path().join("email_reports.json")),
        );

        let result = notifier
            .send_prediction_report("user@example.com", &outcome(), &patient())
            .await
            .unwrap();

        assert_eq!(result.status, DeliveryStatus::Failed);
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_fast_without_audit() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Notifier::new(
            NotifierConfig::default(),
            Arc::new(FileMailer::new(dir.path().join("outbox.txt"))),
            ReportStore::open(dir.path().join("email_reports.json")),
        );

        let err = notifier
            .send_prediction_report("not-an-address", &outcome(), &patient())
            .await
            .unwrap_err();

        assert!(matches!(err, ClaimsightError::InvalidEmailFormat(_)));
        assert!(notifier.reports().all().is_empty());
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        struct SlowMailer;

        #[async_trait]
        impl Mailer for SlowMailer {
            async fn send(&self, _email: &OutboundEmail) -> std::result::Result<(), MailerError> {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            }

            fn describe(&self) -> &str {
                "slow"
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = NotifierConfig {
            timeout_budget: Duration::from_millis(50),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        };
        let notifier = Notifier::new(
            config,
            Arc::new(SlowMailer),
            ReportStore::open(dir.path().join("email_reports.json")),
        );

        let result = notifier
            .send_prediction_report("user@example.com", &outcome(), &patient())
            .await
            .unwrap();

        assert_eq!(result.status, DeliveryStatus::TimedOut);
        assert_eq!(notifier.reports().all()[0].status, DeliveryStatus::TimedOut);
    }
}
