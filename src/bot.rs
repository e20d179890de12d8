use reqwest::Client;
use serde::Serialize;
use anyhow::{Result, anyhow};

use crate::message::RawReply;

/// Rasa REST channel default; overridable via the config file
pub const DEFAULT_WEBHOOK_URL: &str = "http://localhost:5005/webhooks/rest/webhook";

#[derive(Serialize)]
struct WebhookRequest {
    sender: String,
    message: String,
}

/// HTTP client for the agent's REST webhook
#[derive(Clone)]
pub struct BotClient {
    client: Client,
    webhook_url: String,
}

impl BotClient {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Send one outgoing message; the reply is a JSON array of loosely-shaped
    /// items (possibly empty). Any transport or status failure is an error and
    /// the body is ignored.
    pub async fn send_message(&self, message: &str) -> Result<Vec<RawReply>> {
        let request = WebhookRequest {
            sender: "user".to_string(),
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Webhook request failed with status: {}. Check that the agent is running at {}",
                response.status(),
                self.webhook_url
            ));
        }

        let replies: Vec<RawReply> = response.json().await?;
        Ok(replies)
    }
}
