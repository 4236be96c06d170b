//! SMTP mail notifier.
//!
//! Sends one plain-text message per recipient over an implicit-TLS relay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use super::Notifier;
use crate::config::MailConfig;

/// Display name shown for every recipient.
const RECIPIENT_NAME: &str = "auto deploy result";

pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
}

impl MailNotifier {
    pub fn new(config: &MailConfig, password: SecretString) -> Result<Self> {
        let sender: Address = config
            .sender
            .parse()
            .with_context(|| format!("Invalid sender address: {}", config.sender))?;
        let to = config
            .recipients
            .iter()
            .map(|r| {
                r.parse::<Address>()
                    .map(|addr| Mailbox::new(Some(RECIPIENT_NAME.to_string()), addr))
                    .with_context(|| format!("Invalid recipient address: {r}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let credentials = Credentials::new(config.sender.clone(), password.expose_secret().clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay)
            .with_context(|| format!("Invalid SMTP relay: {}", config.relay))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: Mailbox::new(Some(config.sender_name.clone()), sender),
            to,
            subject: config.subject.clone(),
        })
    }

    /// One message per recipient. Alerts get an `[ALERT]` subject prefix.
    pub fn build_messages(&self, message: &str, alert: bool) -> Result<Vec<Message>> {
        let subject = if alert {
            format!("[ALERT] {}", self.subject)
        } else {
            self.subject.clone()
        };

        self.to
            .iter()
            .map(|to| {
                Message::builder()
                    .from(self.from.clone())
                    .to(to.clone())
                    .subject(subject.clone())
                    .header(ContentType::TEXT_PLAIN)
                    .body(message.to_string())
                    .with_context(|| format!("Failed to build mail for {}", to.email))
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, message: &str, alert: bool) -> bool {
        let messages = match self.build_messages(message, alert) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Failed to build notification mail");
                return false;
            }
        };

        let mut all_sent = true;
        for (mail, to) in messages.into_iter().zip(&self.to) {
            match self.transport.send(mail).await {
                Ok(_) => info!(to = %to.email, "Notification mail sent"),
                Err(e) => {
                    warn!(to = %to.email, error = %e, "Failed to send notification mail");
                    all_sent = false;
                }
            }
        }
        all_sent
    }

    fn channel(&self) -> &str {
        "mail"
    }
}
