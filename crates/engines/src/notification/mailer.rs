//! Async SMTP mailer.

use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

/// Sends HTML mail over SMTP with STARTTLS.
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Sender address, used as the fallback recipient when no notify
    /// target is configured.
    #[must_use]
    pub fn from_addr(&self) -> &str {
        if self.config.from_addr.is_empty() {
            &self.config.user
        } else {
            &self.config.from_addr
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let from: Mailbox = self
            .from_addr()
            .parse()
            .context("invalid from email address")?;
        let to_mailbox: Mailbox = to.parse().context("invalid to email address")?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .context("failed to build email message")?;

        let creds = Credentials::new(self.config.user.clone(), self.config.password.clone());
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .context("failed to create SMTP transport")?
                .port(self.config.port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .context("failed to send email via SMTP")?;

        info!(to, subject, "notification email sent");
        Ok(())
    }
}
