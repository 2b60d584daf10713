//! Completion providers.
//!
//! Every supported provider speaks the OpenAI chat-completions dialect, so a
//! single client in [`openai`] serves all of them. The pipeline only sees the
//! [`CompletionClient`] trait.

pub mod openai;

use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

pub use openai::OpenAIClient;

/// Known completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// OpenAI API
    #[value(name = "openai")]
    OpenAI,
    /// DeepSeek API
    #[value(name = "deepseek")]
    DeepSeek,
    /// SiliconFlow API
    #[value(name = "siliconflow")]
    SiliconFlow,
    /// Alibaba Cloud DashScope (OpenAI-compatible mode)
    #[value(name = "alibaba")]
    Alibaba,
}

impl ProviderName {
    pub const ALL: [ProviderName; 4] = [
        ProviderName::OpenAI,
        ProviderName::DeepSeek,
        ProviderName::SiliconFlow,
        ProviderName::Alibaba,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => "openai",
            ProviderName::DeepSeek => "deepseek",
            ProviderName::SiliconFlow => "siliconflow",
            ProviderName::Alibaba => "alibaba",
        }
    }

    /// SiliconFlow rejects the `response_format` hint
    pub fn supports_json_response_format(&self) -> bool {
        !matches!(self, ProviderName::SiliconFlow)
    }

    /// Environment variable that overrides the configured API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => "OPENAI_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::SiliconFlow => "SILICONFLOW_API_KEY",
            ProviderName::Alibaba => "ALIBABA_API_KEY",
        }
    }

    /// Endpoint used in the generated config template
    pub fn default_api_url(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => "https://api.openai.com/v1/chat/completions",
            ProviderName::DeepSeek => "https://api.deepseek.com/chat/completions",
            ProviderName::SiliconFlow => "https://api.siliconflow.cn/v1/chat/completions",
            ProviderName::Alibaba => {
                "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
            }
        }
    }

    /// Model used in the generated config template
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderName::OpenAI => "gpt-4o-mini",
            ProviderName::DeepSeek => "deepseek-chat",
            ProviderName::SiliconFlow => "deepseek-ai/DeepSeek-V3",
            ProviderName::Alibaba => "qwen-plus",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderName::OpenAI),
            "deepseek" => Ok(ProviderName::DeepSeek),
            "siliconflow" => Ok(ProviderName::SiliconFlow),
            "alibaba" => Ok(ProviderName::Alibaba),
            _ => Err(format!(
                "Unknown provider: {}. Valid options: openai, deepseek, siliconflow, alibaba",
                s
            )),
        }
    }
}

/// Resolved settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub api_url: Url,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
}

/// Turns a prompt into the model's raw text reply
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Send one prompt and return `choices[0].message.content` verbatim
    async fn complete(&self, prompt: &str) -> Result<String>;
}
