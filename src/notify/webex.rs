//! Webex messages API client.

use crate::config::NotifierConfig;
use crate::external::UpstreamError;
use crate::notify::{truncate_message, Notifier};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Body of `POST /v1/messages`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest<'a> {
    room_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// Posts messages to one Webex room with a bot token.
pub struct WebexNotifier {
    config: NotifierConfig,
    room_id: String,
    bot_token: String,
    http_client: reqwest::Client,
}

impl WebexNotifier {
    pub fn new(
        config: NotifierConfig,
        room_id: String,
        bot_token: String,
    ) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UpstreamError::Request(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            room_id,
            bot_token,
            http_client,
        })
    }

    fn request_body<'a>(&'a self, message: &'a str) -> MessageRequest<'a> {
        if self.config.markdown {
            MessageRequest {
                room_id: &self.room_id,
                markdown: Some(message),
                text: None,
            }
        } else {
            MessageRequest {
                room_id: &self.room_id,
                markdown: None,
                text: Some(message),
            }
        }
    }
}

#[async_trait]
impl Notifier for WebexNotifier {
    fn name(&self) -> &str {
        "webex"
    }

    async fn notify(&self, message: &str) -> Result<(), UpstreamError> {
        let message = truncate_message(message, self.config.max_message_chars);
        let body = self.request_body(&message);

        debug!("Posting {} characters to Webex room", message.len());

        let response = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                UpstreamError::from_reqwest(e, &self.config.api_url, self.config.timeout_seconds)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api { status, body });
        }

        Ok(())
    }
}
