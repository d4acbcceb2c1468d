// ABOUTME: Main library entry point for the tidechat streaming chat server
// ABOUTME: Provides LLM provider adapters, chat orchestration, and client session state
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Tidechat
//!
//! A multi-tenant streaming chat server over local and remote LLM backends.
//! Subscription plans gate which providers a caller may use; every backend is
//! normalized into one text-stream contract so the orchestration endpoint and
//! clients never branch on provider specifics.
//!
//! ## Features
//!
//! - **Provider registry**: plan-gated table of LLM backends (OpenAI,
//!   Anthropic, LM Studio, Ollama)
//! - **Completion adapters**: SSE and NDJSON wire formats translated into a
//!   single streaming contract, with an offline diagnostic fallback when a
//!   backend is down
//! - **Model discovery**: queries local runtimes for their loaded models
//! - **Chat orchestration**: `POST /chat` relays tokens with the first byte
//!   sent before the backend finishes
//! - **Client session**: explicit state machine with interruption and
//!   edit-and-regenerate, mirrored into SQLite off the render path
//!
//! ## Architecture
//!
//! - **`providers`**: plan entitlement over an immutable registry
//! - **`llm`**: completion and discovery adapters
//! - **`routes`** / **`server`**: axum HTTP surface
//! - **`client`**: session state machine, transport, persistence hook
//! - **`database`**: sqlx-backed conversation store

pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod plans;
pub mod providers;
pub mod routes;
pub mod server;
