// ABOUTME: Completion adapter abstraction translating provider wire formats into one text stream
// ABOUTME: Defines chat message types, the StreamChunk/TextStream contract, and the adapter set
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Completion Adapters
//!
//! Each LLM backend is wrapped in a [`CompletionAdapter`] that accepts a
//! normalized message history and returns a [`TextStream`]: an ordered,
//! finite, single-consumption sequence of text fragments terminated by an
//! explicit final chunk.
//!
//! Adapters never let network or parse errors escape the stream boundary.
//! An unreachable backend produces a deterministic diagnostic reply streamed
//! through the same contract (see [`fallback`]), so the orchestration endpoint
//! and its clients carry no backend-availability branching.

mod anthropic;
pub mod discovery;
pub mod fallback;
mod ndjson;
mod ollama;
mod openai_compatible;
mod sse_parser;

pub use anthropic::AnthropicStandIn;
pub use ollama::OllamaAdapter;
pub use openai_compatible::{OpenAiCompatibleAdapter, OpenAiCompatibleConfig};
pub use sse_parser::{SseEvent, SseLineBuffer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// The last user message in a history, or an empty string
///
/// Used by the offline fallback to quote the caller's request verbatim.
#[must_use]
pub fn last_user_message(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map_or("", |m| m.content.as_str())
}

// ============================================================================
// Stream Contract
// ============================================================================

/// A fragment of a streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content delta for this fragment
    pub delta: String,
    /// Whether this is the final fragment
    pub is_final: bool,
    /// Finish reason if final
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// A content fragment
    #[must_use]
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            is_final: false,
            finish_reason: None,
        }
    }

    /// The explicit end marker
    #[must_use]
    pub fn done(finish_reason: impl Into<String>) -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            finish_reason: Some(finish_reason.into()),
        }
    }
}

/// Ordered, finite, single-consumption stream of text fragments
///
/// A mid-stream `Err` means the connection dropped after fragments were
/// already delivered; consumers treat it as completion at that point and
/// keep the partial content.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

// ============================================================================
// Adapter Trait
// ============================================================================

/// One LLM backend translated into the [`TextStream`] contract
///
/// `complete_stream` is infallible by design: pre-flight failures (backend
/// down, bad status) are converted into the diagnostic fallback stream.
/// Entitlement and validation errors are raised by the caller before the
/// adapter is ever invoked.
#[async_trait]
pub trait CompletionAdapter: Send + Sync {
    /// Stable provider id this adapter serves (a registry key)
    fn id(&self) -> &'static str;

    /// Human-readable backend name, used in diagnostics
    fn display_name(&self) -> &'static str;

    /// Stream a chat completion for the given history
    ///
    /// `model` overrides the adapter's default model when the provider
    /// supports explicit model selection.
    async fn complete_stream(&self, messages: &[ChatMessage], model: Option<&str>) -> TextStream;
}

// ============================================================================
// Adapter Set
// ============================================================================

/// The completion adapters available to the orchestration endpoint, keyed by
/// provider id
pub struct AdapterSet {
    adapters: HashMap<&'static str, Arc<dyn CompletionAdapter>>,
}

impl AdapterSet {
    /// Build an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its own id
    pub fn register(&mut self, adapter: Arc<dyn CompletionAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Look up the adapter for a provider id
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn CompletionAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    /// Wire up the production adapters from server configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn standard(config: &ServerConfig) -> AppResult<Self> {
        let mut set = Self::new();

        set.register(Arc::new(OpenAiCompatibleAdapter::new(
            OpenAiCompatibleConfig::openai(config.openai_api_key.clone()),
        )?));
        set.register(Arc::new(OpenAiCompatibleAdapter::new(
            OpenAiCompatibleConfig::lm_studio(config.lmstudio_base_url.clone()),
        )?));
        set.register(Arc::new(OllamaAdapter::new(
            config.ollama_base_url.clone(),
        )?));
        set.register(Arc::new(AnthropicStandIn::new()));

        Ok(set)
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new()
    }
}
