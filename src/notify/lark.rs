//! Lark (Feishu) bot webhook.
//!
//! Success updates go out as a rich `post` card with a link, alerts as a
//! plain `text` message. The bot answers HTTP 200 when it accepts a
//! message.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use super::Notifier;

const CARD_TITLE: &str = "New update on auto deployment";
const CARD_LINK_TEXT: &str = "Go check email for more details";

pub struct LarkNotifier {
    http: Client,
    webhook_url: String,
    card_link: String,
}

impl LarkNotifier {
    pub fn new(webhook_url: &str, card_link: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Lark HTTP client")?;
        Ok(Self {
            http,
            webhook_url: webhook_url.to_string(),
            card_link: card_link.to_string(),
        })
    }

    /// Webhook body for `message`.
    pub fn payload(&self, message: &str, alert: bool) -> Value {
        if alert {
            return json!({
                "msg_type": "text",
                "content": { "text": message }
            });
        }

        json!({
            "msg_type": "post",
            "content": {
                "post": {
                    "en_us": {
                        "title": CARD_TITLE,
                        "content": [[
                            { "tag": "text", "text": format!("{message} ") },
                            { "tag": "a", "text": CARD_LINK_TEXT, "href": self.card_link }
                        ]]
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Notifier for LarkNotifier {
    async fn notify(&self, message: &str, alert: bool) -> bool {
        let body = self.payload(message, alert);
        match self.http.post(&self.webhook_url).json(&body).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(%status, body = %text, "Lark webhook rejected message");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to reach Lark webhook");
                false
            }
        }
    }

    fn channel(&self) -> &str {
        "lark"
    }
}
