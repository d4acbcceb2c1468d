// ABOUTME: Client-side chat session driving one streamed generation at a time
// ABOUTME: Tracks the visible history and the generation state machine
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Chat Session
//!
//! One session per open conversation. Submitting a message appends it to the
//! history together with an empty assistant placeholder, then consumes the
//! completion stream, growing the placeholder token by token. Exactly one
//! generation may be in flight; [`ChatSession::interrupt`] aborts it while
//! keeping whatever content already arrived.
//!
//! State machine:
//!
//! ```text
//! Idle -> AwaitingFirstToken -> Streaming -> Completed
//!                  |                |   \--> Interrupted
//!                  |                 \-----> Errored
//!                   \----------------------> Errored
//! ```
//!
//! `Completed`, `Interrupted`, and `Errored` all accept the next submission.

use std::sync::{Arc, Mutex};

use futures_util::stream::{abortable, AbortHandle};
use futures_util::StreamExt;
use tracing::debug;

use super::persistence::PersistenceHook;
use super::transport::CompletionTransport;
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, MessageRole};
use crate::routes::ChatRequest;

/// Where a session is in its generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No generation has been started yet
    Idle,
    /// Request sent, no token received yet
    AwaitingFirstToken,
    /// Tokens are arriving
    Streaming,
    /// Stream finished normally
    Completed,
    /// User aborted mid-stream; partial content retained
    Interrupted,
    /// Stream failed mid-flight; partial content retained
    Errored,
}

impl SessionState {
    /// Whether a generation is currently in flight
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::AwaitingFirstToken | Self::Streaming)
    }
}

struct SessionInner {
    history: Vec<ChatMessage>,
    state: SessionState,
    abort: Option<AbortHandle>,
    interrupt_requested: bool,
    last_error: Option<String>,
    provider: String,
    model: Option<String>,
}

/// Live chat session over a completion transport
pub struct ChatSession {
    transport: Arc<dyn CompletionTransport>,
    persistence: Option<Arc<PersistenceHook>>,
    inner: Mutex<SessionInner>,
    /// Signalled whenever a generation reaches a terminal state
    settled: tokio::sync::Notify,
}

impl ChatSession {
    /// Create a session for the given provider settings
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        provider: impl Into<String>,
        model: Option<String>,
        persistence: Option<Arc<PersistenceHook>>,
    ) -> Self {
        Self {
            transport,
            persistence,
            inner: Mutex::new(SessionInner {
                history: Vec::new(),
                state: SessionState::Idle,
                abort: None,
                interrupt_requested: false,
                last_error: None,
                provider: provider.into(),
                model,
            }),
            settled: tokio::sync::Notify::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Snapshot of the visible history
    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.clone()
    }

    /// Message of the last stream failure, if the session is `Errored`
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Switch provider/model for subsequent submissions
    ///
    /// The stored conversation's settings follow the change when a
    /// persistence hook is attached.
    pub async fn set_settings(&self, provider: impl Into<String>, model: Option<String>) {
        let provider = provider.into();
        {
            let mut inner = self.lock();
            inner.provider = provider.clone();
            inner.model = model.clone();
        }
        if let Some(hook) = &self.persistence {
            hook.update_settings(provider, model).await;
        }
    }

    /// Submit a user message and drive the generation to a terminal state
    ///
    /// Submitting while a generation is in flight interrupts it first; only
    /// one generation runs per session at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty. Transport rejections
    /// (authentication, entitlement) surface as the session entering
    /// `Errored`, not as a returned error.
    pub async fn submit(&self, content: &str) -> AppResult<()> {
        if content.trim().is_empty() {
            return Err(AppError::invalid_input("Message must not be empty"));
        }

        loop {
            let settled = self.settled.notified();
            {
                let mut inner = self.lock();
                if !inner.state.is_busy() {
                    inner.history.push(ChatMessage::user(content));
                    break;
                }
                inner.interrupt_requested = true;
                if let Some(abort) = inner.abort.take() {
                    abort.abort();
                }
            }
            settled.await;
        }

        self.generate().await;
        Ok(())
    }

    /// Abort the in-flight generation, keeping partial content
    ///
    /// Effective at any point of the generation, including while the
    /// transport is still connecting and no stream exists yet. No-op when
    /// nothing is in flight.
    pub fn interrupt(&self) {
        let mut inner = self.lock();
        if inner.state.is_busy() {
            inner.interrupt_requested = true;
            if let Some(abort) = inner.abort.take() {
                abort.abort();
            }
        }
    }

    /// Replace the user message at `index` and regenerate from there
    ///
    /// Everything after the edited message is discarded, locally and in the
    /// store (truncate-and-regenerate).
    ///
    /// # Errors
    ///
    /// Returns an error if a generation is in flight or `index` does not
    /// address a user message.
    pub async fn edit_and_regenerate(&self, index: usize, new_content: &str) -> AppResult<()> {
        if new_content.trim().is_empty() {
            return Err(AppError::invalid_input("Message must not be empty"));
        }
        {
            let mut inner = self.lock();
            if inner.state.is_busy() {
                return Err(AppError::invalid_input(
                    "A generation is already in progress",
                ));
            }
            let is_user_message = inner
                .history
                .get(index)
                .is_some_and(|m| m.role == MessageRole::User);
            if !is_user_message {
                return Err(AppError::invalid_input(format!(
                    "Index {index} does not address a user message"
                )));
            }
            inner.history.truncate(index + 1);
            inner.history[index].content = new_content.to_owned();
        }

        if let Some(hook) = &self.persistence {
            hook.handle_edit(index, new_content).await;
        }

        self.generate().await;
        Ok(())
    }

    /// Run one generation over the current history
    ///
    /// Appends the assistant placeholder, consumes the stream, and leaves
    /// the session in a terminal state. Never returns an error; failures are
    /// recorded on the session.
    async fn generate(&self) {
        let request = {
            let mut inner = self.lock();
            inner.state = SessionState::AwaitingFirstToken;
            inner.interrupt_requested = false;
            inner.last_error = None;
            let request = ChatRequest {
                provider: inner.provider.clone(),
                model: inner.model.clone(),
                messages: inner.history.clone(),
            };
            inner.history.push(ChatMessage::assistant(""));
            request
        };

        // Persist the user message before the reply starts arriving
        if let Some(hook) = &self.persistence {
            hook.sync(&request.messages).await;
        }

        let stream = match self.transport.stream_completion(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!("Completion request rejected: {e}");
                self.finish(SessionState::Errored, Some(e.to_string())).await;
                return;
            }
        };

        let (mut stream, abort_handle) = abortable(stream);
        let interrupted_before_start = {
            // A cancellation can land while the transport is still
            // connecting; honor it before consuming a single fragment.
            let mut inner = self.lock();
            if std::mem::take(&mut inner.interrupt_requested) {
                true
            } else {
                inner.abort = Some(abort_handle);
                false
            }
        };
        if interrupted_before_start {
            self.finish(SessionState::Interrupted, None).await;
            return;
        }

        let mut failure: Option<String> = None;
        let mut saw_end_marker = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if !chunk.delta.is_empty() {
                        let mut inner = self.lock();
                        if let Some(last) = inner.history.last_mut() {
                            last.content.push_str(&chunk.delta);
                        }
                        inner.state = SessionState::Streaming;
                    }
                    if chunk.is_final {
                        saw_end_marker = true;
                        break;
                    }
                }
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let interrupted = {
            let mut inner = self.lock();
            inner.abort = None;
            std::mem::take(&mut inner.interrupt_requested)
        };

        let state = if failure.is_some() {
            SessionState::Errored
        } else if interrupted && !saw_end_marker {
            SessionState::Interrupted
        } else {
            // A stream that closes without its end marker still counts as
            // a completed reply
            SessionState::Completed
        };
        self.finish(state, failure).await;
    }

    /// Enter a terminal state and mirror the outcome into the store
    async fn finish(&self, state: SessionState, error: Option<String>) {
        let history = {
            let mut inner = self.lock();
            // Drop a placeholder that never received content
            if inner
                .history
                .last()
                .is_some_and(|m| m.role == MessageRole::Assistant && m.content.is_empty())
            {
                inner.history.pop();
            }
            inner.state = state;
            inner.last_error = error;
            inner.history.clone()
        };

        if let Some(hook) = &self.persistence {
            hook.sync(&history).await;
        }
        self.settled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageRole, StreamChunk, TextStream};
    use async_trait::async_trait;
    use tokio_stream::iter;

    struct ScriptedTransport {
        chunks: Vec<AppResult<StreamChunk>>,
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
            let items: Vec<_> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(chunk) => Ok(chunk.clone()),
                    Err(e) => Err(AppError::new(e.code, e.message.clone())),
                })
                .collect();
            Ok(Box::pin(iter(items)))
        }
    }

    struct RejectingTransport;

    #[async_trait]
    impl CompletionTransport for RejectingTransport {
        async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
            Err(AppError::provider_not_entitled("openai"))
        }
    }

    fn scripted(chunks: Vec<AppResult<StreamChunk>>) -> Arc<dyn CompletionTransport> {
        Arc::new(ScriptedTransport { chunks })
    }

    #[tokio::test]
    async fn test_submit_streams_to_completed() {
        let transport = scripted(vec![
            Ok(StreamChunk::delta("Hello")),
            Ok(StreamChunk::delta(" world")),
            Ok(StreamChunk::done("stop")),
        ]);
        let session = ChatSession::new(transport, "ollama", None, None);

        session.submit("hi").await.unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "Hello world");
    }

    #[tokio::test]
    async fn test_empty_submission_rejected() {
        let session = ChatSession::new(scripted(vec![]), "ollama", None, None);
        assert!(session.submit("   ").await.is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_content() {
        let transport = scripted(vec![
            Ok(StreamChunk::delta("partial")),
            Err(AppError::external_service("Ollama", "connection reset")),
        ]);
        let session = ChatSession::new(transport, "ollama", None, None);

        session.submit("hi").await.unwrap();

        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(session.history()[1].content, "partial");
        assert!(session.last_error().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_transport_rejection_enters_errored() {
        let session = ChatSession::new(Arc::new(RejectingTransport), "openai", None, None);

        session.submit("hi").await.unwrap();

        assert_eq!(session.state(), SessionState::Errored);
        // Rejected before any token: no assistant message
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_close_without_marker_completes() {
        let transport = scripted(vec![Ok(StreamChunk::delta("only"))]);
        let session = ChatSession::new(transport, "ollama", None, None);

        session.submit("hi").await.unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.history()[1].content, "only");
    }

    #[tokio::test]
    async fn test_edit_and_regenerate_truncates_history() {
        let transport = scripted(vec![
            Ok(StreamChunk::delta("reply")),
            Ok(StreamChunk::done("stop")),
        ]);
        let session = ChatSession::new(transport, "ollama", None, None);

        session.submit("first question").await.unwrap();
        session.submit("second question").await.unwrap();
        assert_eq!(session.history().len(), 4);

        session.edit_and_regenerate(0, "revised question").await.unwrap();

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "revised question");
        assert_eq!(history[1].content, "reply");
    }

    #[tokio::test]
    async fn test_edit_rejects_assistant_index() {
        let transport = scripted(vec![
            Ok(StreamChunk::delta("reply")),
            Ok(StreamChunk::done("stop")),
        ]);
        let session = ChatSession::new(transport, "ollama", None, None);
        session.submit("question").await.unwrap();

        assert!(session.edit_and_regenerate(1, "nope").await.is_err());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_resubmission_interrupts_in_flight_generation() {
        use tokio::sync::mpsc;
        use tokio_stream::wrappers::UnboundedReceiverStream;

        // First call streams from a channel that never finishes on its own;
        // later calls complete immediately.
        struct TwoPhaseTransport {
            first: Mutex<Option<mpsc::UnboundedReceiver<AppResult<StreamChunk>>>>,
        }

        #[async_trait]
        impl CompletionTransport for TwoPhaseTransport {
            async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
                if let Some(rx) = self.first.lock().unwrap().take() {
                    return Ok(Box::pin(UnboundedReceiverStream::new(rx)));
                }
                Ok(Box::pin(iter(vec![
                    Ok(StreamChunk::delta("second reply")),
                    Ok(StreamChunk::done("stop")),
                ])))
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(ChatSession::new(
            Arc::new(TwoPhaseTransport {
                first: Mutex::new(Some(rx)),
            }),
            "ollama",
            None,
            None,
        ));

        let driver = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("one").await })
        };

        tx.send(Ok(StreamChunk::delta("partial"))).unwrap();
        while session.state() != SessionState::Streaming {
            tokio::task::yield_now().await;
        }

        session.submit("two").await.unwrap();
        driver.await.unwrap().unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content, "partial");
        assert_eq!(history[2].content, "two");
        assert_eq!(history[3].content, "second reply");
    }

    #[tokio::test]
    async fn test_interrupt_while_connecting_cancels_generation() {
        use tokio::sync::Semaphore;

        // Blocks in the transport until released, then offers a full reply
        struct GatedTransport {
            gate: Arc<Semaphore>,
        }

        #[async_trait]
        impl CompletionTransport for GatedTransport {
            async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
                self.gate.acquire().await.unwrap().forget();
                Ok(Box::pin(iter(vec![
                    Ok(StreamChunk::delta("full reply that must not land")),
                    Ok(StreamChunk::done("stop")),
                ])))
            }
        }

        let gate = Arc::new(Semaphore::new(0));
        let session = Arc::new(ChatSession::new(
            Arc::new(GatedTransport {
                gate: Arc::clone(&gate),
            }),
            "ollama",
            None,
            None,
        ));

        let driver = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("hi").await })
        };

        while session.state() != SessionState::AwaitingFirstToken {
            tokio::task::yield_now().await;
        }
        session.interrupt();
        gate.add_permits(1);

        driver.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Interrupted);
        // No fragment was consumed: only the user message remains
        let history = session.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_interrupt_keeps_partial_content() {
        use tokio::sync::mpsc;
        use tokio_stream::wrappers::UnboundedReceiverStream;

        struct ChannelTransport {
            rx: Mutex<Option<mpsc::UnboundedReceiver<AppResult<StreamChunk>>>>,
        }

        #[async_trait]
        impl CompletionTransport for ChannelTransport {
            async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
                let rx = self.rx.lock().unwrap().take().unwrap();
                Ok(Box::pin(UnboundedReceiverStream::new(rx)))
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(ChatSession::new(
            Arc::new(ChannelTransport {
                rx: Mutex::new(Some(rx)),
            }),
            "ollama",
            None,
            None,
        ));

        let driver = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("hi").await })
        };

        tx.send(Ok(StreamChunk::delta("partial"))).unwrap();
        // Wait for the token to land before aborting
        while session.state() != SessionState::Streaming {
            tokio::task::yield_now().await;
        }
        session.interrupt();

        driver.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Interrupted);
        assert_eq!(session.history()[1].content, "partial");
    }
}
