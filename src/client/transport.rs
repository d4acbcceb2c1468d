// ABOUTME: Transport trait plus the reqwest implementation hitting POST /chat
// ABOUTME: Reassembles the chunked text body into stream chunks, carrying split UTF-8
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;

use crate::errors::{AppError, AppResult, ErrorResponse};
use crate::llm::{StreamChunk, TextStream};
use crate::routes::ChatRequest;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// How a session reaches the chat orchestration endpoint
///
/// Abstracted so tests can drive a session with a scripted stream instead of
/// a live server.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Start a streamed completion for the given request
    ///
    /// # Errors
    ///
    /// Returns the orchestration endpoint's error (authentication,
    /// entitlement, validation) when the request is rejected before any
    /// content is streamed.
    async fn stream_completion(&self, request: &ChatRequest) -> AppResult<TextStream>;
}

/// HTTP transport against a running chat server
pub struct HttpCompletionTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpCompletionTransport {
    /// Create a transport for the given server base URL and session token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: String, token: String) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl CompletionTransport for HttpCompletionTransport {
    async fn stream_completion(&self, request: &ChatRequest) -> AppResult<TextStream> {
        let url = format!("{}/chat", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::external_service("chat server", format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Prefer the structured envelope; fall back to the raw body
            let error = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(envelope) => AppError::new(envelope.error.code, envelope.error.message),
                Err(_) => AppError::external_service(
                    "chat server",
                    format!("Unexpected status {status}: {body}"),
                ),
            };
            return Err(error);
        }

        let mut byte_stream = response.bytes_stream();
        let out = stream! {
            // Body chunks can split multi-byte UTF-8 sequences; hold the
            // incomplete tail until the next read completes it.
            let mut pending: Vec<u8> = Vec::new();

            while let Some(read) = byte_stream.next().await {
                match read {
                    Ok(bytes) => {
                        pending.extend_from_slice(&bytes);
                        let valid_len = match std::str::from_utf8(&pending) {
                            Ok(_) => pending.len(),
                            Err(e) => e.valid_up_to(),
                        };
                        if valid_len > 0 {
                            let text =
                                String::from_utf8_lossy(&pending[..valid_len]).into_owned();
                            pending.drain(..valid_len);
                            yield Ok(StreamChunk::delta(text));
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::external_service(
                            "chat server",
                            format!("Stream read error: {e}"),
                        ));
                        return;
                    }
                }
            }

            yield Ok(StreamChunk::done("stop"));
        };

        Ok(Box::pin(out))
    }
}
