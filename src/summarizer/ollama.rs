//! Ollama chat client used for the cost narrative.

use crate::config::SummarizerConfig;
use crate::external::UpstreamError;
use crate::summarizer::Summarizer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Summarizer backed by a local or remote Ollama server.
pub struct OllamaSummarizer {
    config: SummarizerConfig,
    http_client: reqwest::Client,
}

impl OllamaSummarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self, UpstreamError> {
        info!(
            "Initializing summarizer with model {} at {}",
            config.model, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UpstreamError::Request(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn summarize(&self, prompt: &str) -> Result<String, UpstreamError> {
        let url = self.chat_url();

        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending {} character prompt to {}", prompt.len(), url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                UpstreamError::from_reqwest(e, &self.config.ollama_url, self.config.timeout_seconds)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        let content = chat_response.message.content.trim().to_string();
        if content.is_empty() {
            return Err(UpstreamError::InvalidResponse(
                "model returned an empty message".to_string(),
            ));
        }

        Ok(content)
    }
}

/// System prompt for the narrative.
const SYSTEM_PROMPT: &str = r#"You are a cloud cost analyst.
You write concise, factual summaries of daily cloud spend for engineering teams.
Use markdown. Do not invent numbers that are not in the data."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_trims_slash() {
        let summarizer = OllamaSummarizer::new(SummarizerConfig {
            ollama_url: "http://localhost:11434/".to_string(),
            ..SummarizerConfig::default()
        })
        .unwrap();
        assert_eq!(summarizer.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(summarizer.model(), "mistral");
    }

    #[test]
    fn test_request_shape() {
        let request = OllamaChatRequest {
            model: "mistral".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: false,
            options: OllamaOptions { temperature: 0.2 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["options"]["temperature"].is_number());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_upstream_error() {
        let summarizer = OllamaSummarizer::new(SummarizerConfig {
            // Port 9 (discard) is reserved and never runs an Ollama server.
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..SummarizerConfig::default()
        })
        .unwrap();

        let err = summarizer.summarize("prompt").await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Request(_) | UpstreamError::Timeout(_)
        ));
    }
}
