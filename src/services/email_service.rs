use async_trait::async_trait;
use chrono::Local;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::errors::{AppError, Result};

/// Outbound delivery channel for plaintext OTP codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> Result<()>;
}

/// Sends one HTML message per code over SMTP.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = config
            .user
            .parse::<Mailbox>()
            .map_err(|e| AppError::configuration(format!("Invalid SMTP_USER address: {}", e)))?;

        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| {
                AppError::configuration(format!("Failed to configure SMTP transport: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self { transport, from })
    }
}

fn subject() -> String {
    format!(
        "OTP for verification {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

fn html_body(code: &str) -> String {
    format!("<h1>Your OTP is {}</h1>", code)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<()> {
        let recipient = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::mail(format!("Invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject())
            .header(header::ContentType::TEXT_HTML)
            .body(html_body(code))
            .map_err(|e| AppError::mail(format!("Failed to build email message: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::mail(format!("Failed to send email: {}", e)))?;

        tracing::info!(email = to, "OTP email sent");
        Ok(())
    }
}

/// Stands in when no SMTP configuration is present. The service already
/// logs every generated code, so delivery becomes a no-op.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send_otp(&self, to: &str, _code: &str) -> Result<()> {
        tracing::info!(email = to, "no SMTP transport configured, skipping email delivery");
        Ok(())
    }
}
