// ABOUTME: Completion adapter for the native Ollama chat API with NDJSON streaming
// ABOUTME: Buffers partial lines across reads and degrades to the offline fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Ollama Adapter
//!
//! Talks to Ollama's native `/api/chat` endpoint. The streamed response is
//! newline-delimited JSON whose chunk boundaries do not align with line
//! boundaries, so lines are reassembled through [`NdjsonLineBuffer`] before
//! parsing. Each object contributes `message.content`; an object with
//! `done: true` terminates the stream.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ndjson::NdjsonLineBuffer;
use super::{fallback, last_user_message, ChatMessage, CompletionAdapter, StreamChunk, TextStream};
use crate::errors::{AppError, AppResult};
use crate::providers::ids;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Model used when the request does not name one
const DEFAULT_MODEL: &str = "llama3";

// ============================================================================
// Wire Types (Ollama /api/chat format)
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OllamaMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// One NDJSON object from the streamed response
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for a local Ollama runtime
pub struct OllamaAdapter {
    client: Client,
    base_url: String,
}

impl OllamaAdapter {
    /// Create a new adapter for the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: String) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionAdapter for OllamaAdapter {
    fn id(&self) -> &'static str {
        ids::OLLAMA
    }

    fn display_name(&self) -> &'static str {
        "Ollama"
    }

    #[instrument(skip(self, messages))]
    async fn complete_stream(&self, messages: &[ChatMessage], model: Option<&str>) -> TextStream {
        let request_body = OllamaChatRequest {
            model: model.unwrap_or(DEFAULT_MODEL).to_owned(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream: true,
        };

        debug!(
            "Requesting streamed completion from Ollama ({} messages, model={})",
            messages.len(),
            request_body.model
        );

        let response = match self
            .client
            .post(self.api_url("chat"))
            .json(&request_body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("Ollama returned status {}, falling back", response.status());
                return fallback::offline_stream("Ollama", last_user_message(messages));
            }
            Err(e) => {
                debug!("Ollama request failed: {e}");
                return fallback::offline_stream("Ollama", last_user_message(messages));
            }
        };

        let mut byte_stream = response.bytes_stream();
        let out = stream! {
            let mut buffer = NdjsonLineBuffer::new();

            while let Some(read) = byte_stream.next().await {
                match read {
                    Ok(bytes) => {
                        for line in buffer.feed(&bytes) {
                            match serde_json::from_str::<OllamaChatChunk>(&line) {
                                Ok(chunk) => {
                                    if let Some(message) = chunk.message {
                                        if !message.content.is_empty() {
                                            yield Ok(StreamChunk::delta(message.content));
                                        }
                                    }
                                    if chunk.done {
                                        yield Ok(StreamChunk::done("stop"));
                                        return;
                                    }
                                }
                                Err(e) => {
                                    // Malformed line is transient noise, not fatal
                                    debug!("Skipping unparseable Ollama line: {e}");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::external_service(
                            "Ollama",
                            format!("Stream read error: {e}"),
                        ));
                        return;
                    }
                }
            }

            // Connection closed without done:true
            if let Some(line) = buffer.flush() {
                if let Ok(chunk) = serde_json::from_str::<OllamaChatChunk>(&line) {
                    if let Some(message) = chunk.message {
                        if !message.content.is_empty() {
                            yield Ok(StreamChunk::delta(message.content));
                        }
                    }
                }
            }
            yield Ok(StreamChunk::done("stop"));
        };

        Box::pin(out)
    }
}
