// ABOUTME: Anthropic stand-in adapter echoing the last user message as a single-shot stream
// ABOUTME: Placeholder for wiring a real provider without altering the orchestration contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use tokio_stream::iter;

use super::{last_user_message, ChatMessage, CompletionAdapter, StreamChunk, TextStream};
use crate::providers::ids;

/// Synchronous echo wrapped in the single-shot stream contract
///
/// One content chunk, then the end marker. Swapping in a real Anthropic
/// client later only changes this adapter; the orchestration endpoint and
/// clients are unaffected.
pub struct AnthropicStandIn;

impl AnthropicStandIn {
    /// Create the stand-in adapter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AnthropicStandIn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionAdapter for AnthropicStandIn {
    fn id(&self) -> &'static str {
        ids::ANTHROPIC
    }

    fn display_name(&self) -> &'static str {
        "Anthropic"
    }

    async fn complete_stream(&self, messages: &[ChatMessage], _model: Option<&str>) -> TextStream {
        let reply = format!("Anthropic echo: {}", last_user_message(messages));
        Box::pin(iter(vec![
            Ok(StreamChunk::delta(reply)),
            Ok(StreamChunk::done("stop")),
        ]))
    }
}
