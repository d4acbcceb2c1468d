// ABOUTME: Chat orchestration endpoint relaying adapter streams as chunked bodies
// ABOUTME: Authenticates, checks entitlement, dispatches, then streams verbatim
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Chat Orchestration
//!
//! `POST /chat` is the single entry point for completions. Steps are strictly
//! ordered: authenticate, check entitlement for the requested provider,
//! dispatch to its adapter, relay the stream. The first byte leaves before
//! the backend finishes; fragment order and boundaries are preserved exactly
//! as the adapter produced them.
//!
//! The endpoint has no storage side effects; persisting the exchange is the
//! client's job.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};
use http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, TextStream};
use crate::server::ServerResources;

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Provider id (a registry key)
    pub provider: String,
    /// Model override, honored only when the provider supports selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Full message history, oldest first
    pub messages: Vec<ChatMessage>,
}

/// Reduce a text stream to the raw bytes relayed to the client
///
/// A mid-stream error ends the relay at that point; everything already
/// delivered stands, matching the client contract of treating a dropped
/// connection as completion.
fn relay_bytes(stream: TextStream) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream
        .take_while(|item| future::ready(item.is_ok()))
        .filter_map(|item| {
            future::ready(match item {
                Ok(chunk) if !chunk.delta.is_empty() => {
                    Some(Ok(Bytes::from(chunk.delta)))
                }
                _ => None,
            })
        })
}

/// Handle `POST /chat`
///
/// # Errors
///
/// 401 when unauthenticated, 403 when the provider is not entitled for the
/// caller's plan, 400 when the provider is unrecognized, 500 on internal
/// wiring failures.
pub async fn chat_handler(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> AppResult<Response> {
    let auth = resources.authenticator.authenticate(&headers).await?;
    let descriptor = resources
        .registry
        .check_entitlement(auth.plan, &request.provider)?;

    let adapter = resources.adapters.get(&request.provider).ok_or_else(|| {
        AppError::internal(format!(
            "No adapter registered for provider '{}'",
            request.provider
        ))
    })?;

    let model = if descriptor.supports_model_selection {
        request.model.as_deref()
    } else {
        None
    };

    debug!(
        provider = %request.provider,
        messages = request.messages.len(),
        "Dispatching completion request"
    );

    let stream = adapter.complete_stream(&request.messages, model).await;

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(relay_bytes(stream)))
        .map_err(|e| AppError::internal(format!("Failed to build response: {e}")))
}
