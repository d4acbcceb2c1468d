// ABOUTME: HTTP route handlers for the chat server
// ABOUTME: Chat orchestration, model discovery, and a liveness probe
//
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod chat;
pub mod models;

pub use chat::ChatRequest;

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
