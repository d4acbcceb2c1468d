// ABOUTME: Client-side chat session layer consuming the streaming chat endpoint
// ABOUTME: Covers transport, live session state, and the persistence hook
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Chat Client
//!
//! The pieces a chat frontend builds on: [`CompletionTransport`] reaches the
//! orchestration endpoint, [`ChatSession`] tracks the live generation state
//! machine, and [`PersistenceHook`] mirrors the session into durable storage
//! without ever blocking the visible stream.

mod persistence;
mod session;
mod transport;

pub use persistence::{derive_title, PersistenceHook};
pub use session::{ChatSession, SessionState};
pub use transport::{CompletionTransport, HttpCompletionTransport};
