// ABOUTME: Offline fallback stream synthesizing a diagnostic reply when a backend is down
// ABOUTME: Streams the diagnostic word-by-word with an artificial typing delay
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Offline Fallback
//!
//! When a backend is unreachable, adapters do not surface an error. They
//! synthesize a deterministic diagnostic reply stating the backend is not
//! running, quoting the caller's last message verbatim, and stream it
//! word-by-word through the normal [`TextStream`](super::TextStream) contract.
//! The orchestration endpoint and its clients never branch on backend
//! availability.

use std::time::Duration;

use async_stream::stream;
use tokio::time::sleep;
use tracing::warn;

use super::{StreamChunk, TextStream};

/// Delay between streamed words, approximating a typing cadence
const WORD_DELAY: Duration = Duration::from_millis(25);

/// Compose the diagnostic text for an unreachable backend
#[must_use]
pub fn offline_reply(backend_name: &str, last_user_message: &str) -> String {
    format!(
        "{backend_name} is not running or accessible. Please start it locally and send your \
         message again. Your message was: \"{last_user_message}\""
    )
}

/// Build the fallback stream for an unreachable backend
///
/// The reply is streamed word-by-word with a small per-word delay and ends
/// with an explicit final chunk, exactly like a live completion.
#[must_use]
pub fn offline_stream(backend_name: &'static str, last_user_message: &str) -> TextStream {
    warn!("{backend_name} unreachable, streaming offline diagnostic reply");

    let reply = offline_reply(backend_name, last_user_message);
    let words: Vec<String> = reply.split_whitespace().map(ToOwned::to_owned).collect();

    let out = stream! {
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                yield Ok(StreamChunk::delta(format!(" {word}")));
            } else {
                yield Ok(StreamChunk::delta(word.clone()));
            }
            sleep(WORD_DELAY).await;
        }
        yield Ok(StreamChunk::done("offline"));
    };

    Box::pin(out)
}
