use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::markdown::format_message;
use super::Publisher;
use crate::config::AppConfig;
use crate::retry::{with_retry, RetryPolicy};
use crate::source::Item;
use crate::{Error, Result};

const PARSE_MODE: &str = "MarkdownV2";

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    error_code: Option<u16>,
    description: Option<String>,
}

/// Posts items to a Telegram channel through the Bot API
pub struct TelegramPublisher {
    client: Client,
    // contains the bot token; never log it
    endpoint: String,
    channel_id: String,
    caption: String,
    timeout: Duration,
    policy: RetryPolicy,
}

impl TelegramPublisher {
    pub fn new(config: &AppConfig, client: Client) -> Self {
        let telegram = &config.telegram;
        Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                telegram.api_base_url.trim_end_matches('/'),
                telegram.bot_token
            ),
            channel_id: telegram.channel_id.clone(),
            caption: telegram.caption.clone(),
            timeout: Duration::from_secs(telegram.request_timeout_secs),
            policy: RetryPolicy::publish(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.channel_id,
            text,
            parse_mode: PARSE_MODE,
            link_preview_options: LinkPreviewOptions { is_disabled: false },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        match serde_json::from_slice::<TelegramResponse>(&body) {
            Ok(reply) if reply.ok => Ok(()),
            Ok(reply) => Err(Error::Telegram {
                code: reply.error_code.unwrap_or(status.as_u16()),
                description: reply.description.unwrap_or_default(),
            }),
            // Proxies and load balancers answer with HTML on 5xx
            Err(_) if !status.is_success() => Err(Error::Telegram {
                code: status.as_u16(),
                description: String::from_utf8_lossy(&body).chars().take(200).collect(),
            }),
            Err(e) => Err(Error::Json(e)),
        }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn post(&self, item: &Item) -> Result<()> {
        let message = format_message(&item.title, &item.link, &self.caption);
        let text = message.as_str();

        with_retry(&self.policy, "telegram send", move || self.send_message(text)).await?;

        tracing::info!(title = %item.title, "Successfully posted");
        Ok(())
    }
}
