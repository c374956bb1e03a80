//! Outgoing transactional mail.

use crate::config::SmtpSettings;
use crate::error::AppError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

fn mailbox(field: &str, addr: &str) -> Result<Mailbox, AppError> {
    addr.parse()
        .map_err(|e| AppError::Mail(format!("invalid {} address {}: {}", field, addr, e)))
}

/// SMTP with STARTTLS on the tokio runtime.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        let from = mailbox("from", &settings.from)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| AppError::Mail(format!("smtp relay {}: {}", settings.host, e)))?
            .port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(mailbox("to", &mail.to)?)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_HTML);
        if let Some(reply_to) = &mail.reply_to {
            builder = builder.reply_to(mailbox("reply-to", reply_to)?);
        }
        let message = builder
            .body(mail.html)
            .map_err(|e| AppError::Mail(format!("build message: {}", e)))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("smtp send: {}", e)))?;
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured: the mail is logged and dropped.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, bytes = mail.html.len(), "smtp not configured, mail logged only");
        Ok(())
    }
}

/// Keeps sent mail in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MemoryMailer {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        match self.sent.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Mail("delivery refused".into()));
        }
        match self.sent.lock() {
            Ok(mut g) => g.push(mail),
            Err(poisoned) => poisoned.into_inner().push(mail),
        }
        Ok(())
    }
}
