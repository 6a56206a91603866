// src/mail.rs

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};

use crate::{config::SmtpConfig, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailFormat {
    Html,
    Text,
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub format: MailFormat,
}

/// Outbound mail seam. Jobs only talk to this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

/// Delivers over SMTP with STARTTLS and login credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::InternalServerError(format!("SMTP setup failed: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let content_type = match mail.format {
            MailFormat::Html => ContentType::TEXT_HTML,
            MailFormat::Text => ContentType::TEXT_PLAIN,
        };

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| AppError::InternalServerError("Invalid SMTP_FROM".to_string()))?,
            )
            .to(mail
                .to
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid e-mail address '{}'", mail.to)))?)
            .subject(mail.subject)
            .header(content_type)
            .body(mail.body)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            tracing::error!("SMTP delivery to {} failed: {:?}", mail.to, e);
            AppError::InternalServerError(e.to_string())
        })?;

        tracing::info!("Mail sent to {}", mail.to);
        Ok(())
    }
}

/// Used when SMTP is not configured: logs each message and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            bytes = mail.body.len(),
            "SMTP disabled, mail not delivered"
        );
        Ok(())
    }
}

/// Picks the SMTP mailer when configured, the logging one otherwise.
pub fn from_config(smtp: Option<&SmtpConfig>) -> Result<Arc<dyn Mailer>, AppError> {
    match smtp {
        Some(config) => Ok(Arc::new(SmtpMailer::new(config)?)),
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_every_message() {
        let mailer = from_config(None).unwrap();
        for _ in 0..3 {
            mailer
                .send(OutgoingMail {
                    to: "ana@example.com".into(),
                    subject: "Monthly Quiz Report - 2024-01".into(),
                    body: "<p>hi</p>".into(),
                    format: MailFormat::Html,
                })
                .await
                .unwrap();
        }
    }
}
