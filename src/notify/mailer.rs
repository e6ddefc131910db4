//! Mail transports behind a capability trait
//!
//! `SmtpMailer` delivers through an async STARTTLS relay; `FileMailer`
//! appends rendered messages to a local outbox file and is used when no
//! relay credentials are configured (and in tests).

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use std::path::PathBuf;
use thiserror::Error;

/// A rendered message ready for delivery
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Classified transport failure
#[derive(Error, Debug)]
pub enum MailerError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("recipient refused: {0}")]
    Refused(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("send failed: {0}")]
    Other(String),
}

/// Outbound mail capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError>;

    /// Short transport description for logs and audit records.
    fn describe(&self) -> &str;
}

/// STARTTLS SMTP relay transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
    ) -> Result<Self, MailerError> {
        let from: Mailbox = username
            .parse()
            .map_err(|e| MailerError::Other(format!("invalid sender address: {}", e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailerError::Connection(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from })
    }

    fn classify(error: lettre::transport::smtp::Error) -> MailerError {
        let message = error.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("authentication") || lowered.contains("credentials") {
            MailerError::Auth(message)
        } else if error.is_permanent() {
            MailerError::Refused(message)
        } else {
            MailerError::Connection(message)
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailerError::Refused(format!("invalid recipient: {}", e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| MailerError::Other(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(Self::classify)
    }

    fn describe(&self) -> &str {
        "smtp"
    }
}

/// Local outbox sink: appends messages to a file instead of delivering
pub struct FileMailer {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileMailer {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MailerError::Other(e.to_string()))?;
        }
        let entry = format!(
            "To: {}\nSubject: {}\n\n{}\n---\n",
            email.to, email.subject, email.html_body
        );
        let mut existing = std::fs::read_to_string(&self.path).unwrap_or_default();
        existing.push_str(&entry);
        std::fs::write(&self.path, existing).map_err(|e| MailerError::Other(e.to_string()))
    }

    fn describe(&self) -> &str {
        "local-outbox"
    }
}
