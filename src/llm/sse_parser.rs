// ABOUTME: Line-buffering SSE parser for OpenAI-style streaming chat completions
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # SSE Stream Parser
//!
//! Server-sent-event framing for the OpenAI-compatible adapters. Two
//! correctness concerns are handled here once, for every provider:
//!
//! 1. **Multiple events per TCP chunk**: when the network batches several SSE
//!    frames into one read, all of them are emitted.
//! 2. **Partial lines across TCP boundaries**: a JSON payload split across two
//!    reads is buffered until the terminating newline arrives.
//!
//! Frames that fail to parse are skipped as transient noise; the stream is
//! never aborted for a malformed frame.

use std::mem;

use async_stream::stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use super::{StreamChunk, TextStream};
use crate::errors::AppError;

/// A parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination signal (OpenAI convention)
    Done,
}

/// Line-buffering SSE parser
///
/// SSE streams are newline-delimited but TCP does not align chunk boundaries
/// with event boundaries. Incomplete lines stay buffered until a full line
/// (terminated by `\n`) is available.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete SSE events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();

            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush any trailing partial line when the byte stream ends
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        Self::parse_line(&remaining)
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }
        // Non-data SSE fields (event:, id:, retry:, comments) are ignored
        let data = trimmed.strip_prefix("data: ")?;
        if data.trim().is_empty() {
            None
        } else {
            Some(SseEvent::Data(data.to_owned()))
        }
    }
}

/// Wrap a raw byte stream in SSE framing and provider-specific JSON parsing
///
/// `parse_data` converts one `data:` JSON payload into a content delta;
/// returning `None` skips the frame (malformed JSON, metadata-only chunks).
/// The resulting stream always ends with an explicit final chunk, whether the
/// provider sent `[DONE]` or simply closed the connection.
pub fn sse_text_stream<S, F>(byte_stream: S, parse_data: F, provider_name: &'static str) -> TextStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    let out = stream! {
        let mut parser = SseLineBuffer::new();
        let mut byte_stream = Box::pin(byte_stream);
        let mut finished = false;

        while let Some(read) = byte_stream.next().await {
            match read {
                Ok(bytes) => {
                    for event in parser.feed(&bytes) {
                        match event {
                            SseEvent::Data(payload) => {
                                if let Some(delta) = parse_data(&payload) {
                                    if !delta.is_empty() {
                                        yield Ok(StreamChunk::delta(delta));
                                    }
                                } else {
                                    debug!("Skipping unparseable {provider_name} SSE frame");
                                }
                            }
                            SseEvent::Done => {
                                finished = true;
                                yield Ok(StreamChunk::done("stop"));
                            }
                        }
                    }
                    if finished {
                        return;
                    }
                }
                Err(e) => {
                    // Fragments already delivered stay delivered; the consumer
                    // treats this as completion at the point of interruption.
                    yield Err(AppError::external_service(
                        provider_name,
                        format!("Stream read error: {e}"),
                    ));
                    return;
                }
            }
        }

        // Connection closed without [DONE]: flush and terminate cleanly
        if let Some(SseEvent::Data(payload)) = parser.flush() {
            if let Some(delta) = parse_data(&payload) {
                if !delta.is_empty() {
                    yield Ok(StreamChunk::delta(delta));
                }
            }
        }
        yield Ok(StreamChunk::done("stop"));
    };

    Box::pin(out)
}
