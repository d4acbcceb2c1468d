// ABOUTME: Completion adapter for OpenAI-compatible chat endpoints (OpenAI cloud, LM Studio)
// ABOUTME: Streams SSE JSON deltas and degrades to the offline fallback when unreachable
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # OpenAI-Compatible Adapter
//!
//! Covers every backend speaking the OpenAI chat-completions wire format:
//! the OpenAI API itself and LM Studio's local server. The streaming response
//! is a sequence of SSE frames carrying JSON deltas; each frame's
//! `choices[0].delta.content` is extracted, frames that fail to parse are
//! skipped, and the stream terminates on `data: [DONE]` or connection close.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::sse_parser::sse_text_stream;
use super::{fallback, last_user_message, ChatMessage, CompletionAdapter, TextStream};
use crate::errors::{AppError, AppResult};
use crate::providers::ids;

/// Connection timeout for the initial request
const CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Wire Types (OpenAI chat-completions format)
// ============================================================================

/// Chat completion request body
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

/// Message structure for the OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Streaming chunk structure
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

/// Choice in a streaming chunk
#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

/// Delta content in a streaming chunk
#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Registry key this adapter serves
    pub provider_id: &'static str,
    /// Backend name used in logs and offline diagnostics
    pub display_name: &'static str,
    /// Base URL without the `/v1` suffix
    pub base_url: String,
    /// Bearer token; LM Studio expects the fixed token `lm-studio`
    pub api_key: Option<String>,
    /// Model used when the request does not name one
    pub default_model: String,
}

impl OpenAiCompatibleConfig {
    /// Configuration for the OpenAI cloud API
    #[must_use]
    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            provider_id: ids::OPENAI,
            display_name: "OpenAI",
            base_url: "https://api.openai.com".to_owned(),
            api_key,
            default_model: "gpt-4o-mini".to_owned(),
        }
    }

    /// Configuration for a local LM Studio server
    #[must_use]
    pub fn lm_studio(base_url: String) -> Self {
        Self {
            provider_id: ids::LOCAL_LLM,
            display_name: "LM Studio",
            base_url,
            api_key: Some("lm-studio".to_owned()),
            default_model: "local-model".to_owned(),
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for any endpoint implementing the OpenAI chat-completions API
pub struct OpenAiCompatibleAdapter {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleAdapter {
    /// Create a new adapter with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/v1/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    /// Extract `choices[0].delta.content` from one SSE JSON payload
    fn parse_delta(payload: &str) -> Option<String> {
        let chunk: OpenAiStreamChunk = serde_json::from_str(payload).ok()?;
        chunk.choices.into_iter().next()?.delta.content
    }
}

#[async_trait]
impl CompletionAdapter for OpenAiCompatibleAdapter {
    fn id(&self) -> &'static str {
        self.config.provider_id
    }

    fn display_name(&self) -> &'static str {
        self.config.display_name
    }

    #[instrument(skip(self, messages), fields(provider = self.config.provider_id))]
    async fn complete_stream(&self, messages: &[ChatMessage], model: Option<&str>) -> TextStream {
        let model = model.unwrap_or(&self.config.default_model);
        let request_body = OpenAiRequest {
            model: model.to_owned(),
            messages: messages.iter().map(OpenAiMessage::from).collect(),
            stream: true,
        };

        debug!(
            "Requesting streamed completion from {} ({} messages, model={model})",
            self.config.display_name,
            messages.len()
        );

        let request = self
            .add_auth_header(self.client.post(self.api_url("chat/completions")))
            .header("Content-Type", "application/json")
            .json(&request_body);

        let response = match request.send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(
                    "{} returned status {}, falling back to offline reply",
                    self.config.display_name,
                    response.status()
                );
                return fallback::offline_stream(
                    self.config.display_name,
                    last_user_message(messages),
                );
            }
            Err(e) => {
                debug!("{} request failed: {e}", self.config.display_name);
                return fallback::offline_stream(
                    self.config.display_name,
                    last_user_message(messages),
                );
            }
        };

        sse_text_stream(
            response.bytes_stream(),
            Self::parse_delta,
            self.config.display_name,
        )
    }
}
