// ABOUTME: Newline-delimited JSON framing for Ollama streaming responses
// ABOUTME: Buffers partial lines across read boundaries, emitting only complete lines
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama's `/api/chat` streams newline-delimited JSON objects, and chunk
//! boundaries from the socket do not align with line boundaries. This buffer
//! accumulates bytes and yields only complete lines for parsing.

use std::mem;

/// Line buffer for newline-delimited JSON streams
#[derive(Debug, Default)]
pub struct NdjsonLineBuffer {
    buffer: String,
}

impl NdjsonLineBuffer {
    /// Create a new empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete non-empty line
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a trailing unterminated line when the stream ends
    pub fn flush(&mut self) -> Option<String> {
        let remaining = mem::take(&mut self.buffer);
        let trimmed = remaining.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }
}
