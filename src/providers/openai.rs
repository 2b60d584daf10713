//! OpenAI-compatible chat-completions client.
//!
//! Used for every provider; only the URL, key, model and the
//! `response_format` hint differ between them.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CompletionClient, ProviderConfig, ProviderName};
use crate::error::{Result, WoquError};

/// Upper bound on a single completion request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAIClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WoquError::Network {
                provider: config.name,
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            response_format: self
                .config
                .name
                .supports_json_response_format()
                .then_some(ResponseFormat {
                    kind: "json_object",
                }),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    fn name(&self) -> ProviderName {
        self.config.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let provider = self.config.name;
        let request = self.build_request(prompt);
        debug!(%provider, model = %self.config.model, url = %self.config.api_url, "sending completion request");

        let response = self
            .client
            .post(self.config.api_url.clone())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| WoquError::Network {
                provider,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(WoquError::RateLimited { provider });
            }
            let body = response.text().await.unwrap_or_default();
            return Err(WoquError::Api {
                provider,
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| WoquError::InvalidResponse {
                    provider,
                    message: e.to_string(),
                })?;

        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| WoquError::InvalidResponse {
                provider,
                message: "response contained no choices".to_string(),
            })?;

        first
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| WoquError::InvalidResponse {
                provider,
                message: "first choice has no message content".to_string(),
            })
    }
}

// API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
