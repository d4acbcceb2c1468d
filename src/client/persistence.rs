// ABOUTME: Persistence hook mirroring session history into the conversation store
// ABOUTME: Lazy conversation creation, incremental saves, one-shot title derivation
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Persistence Hook
//!
//! Sits beside a [`ChatSession`](super::ChatSession) and mirrors its history
//! into a [`ConversationStore`]. Storage failures never surface on the chat
//! path: every error is logged and forwarded on the hook's error channel,
//! and the next sync retries from the last message known to be saved.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::database::ConversationStore;
use crate::errors::AppError;
use crate::llm::{ChatMessage, MessageRole};

/// First-user-message words kept when a title must be shortened
const TITLE_WORD_LIMIT: usize = 6;
/// Character budget before the shortened form gains an ellipsis
const TITLE_TRUNCATE_AT: usize = 47;
/// Messages up to this length become the title verbatim
const TITLE_VERBATIM_MAX: usize = 50;

/// Derive a conversation title from the first user message
///
/// Short messages are used verbatim. Longer ones are reduced to their
/// leading words; if even those exceed the character budget the title is
/// cut and suffixed with `...`. The result never exceeds 50 characters.
#[must_use]
pub fn derive_title(first_user_message: &str) -> String {
    let trimmed = first_user_message.trim();
    if trimmed.is_empty() {
        return "New Conversation".to_owned();
    }

    let joined = trimmed
        .split_whitespace()
        .take(TITLE_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() > TITLE_TRUNCATE_AT {
        let head: String = joined.chars().take(TITLE_TRUNCATE_AT).collect();
        format!("{head}...")
    } else if trimmed.chars().count() <= TITLE_VERBATIM_MAX {
        trimmed.to_owned()
    } else {
        joined
    }
}

#[derive(Default)]
struct HookState {
    conversation_id: Option<String>,
    /// Set while a create is in flight so a concurrent sync cannot start a
    /// second one
    initializing: bool,
    /// Store ids of saved messages, index-aligned with session history
    saved_ids: Vec<String>,
    title_set: bool,
    provider: String,
    model: Option<String>,
}

/// Mirrors session history into a conversation store
pub struct PersistenceHook {
    store: Arc<dyn ConversationStore>,
    user_id: String,
    state: tokio::sync::Mutex<HookState>,
    error_tx: mpsc::UnboundedSender<AppError>,
}

impl PersistenceHook {
    /// Create a hook for the given user and provider settings
    ///
    /// The returned receiver carries every storage failure the hook absorbs.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        user_id: impl Into<String>,
        provider: impl Into<String>,
        model: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<AppError>) {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let hook = Self {
            store,
            user_id: user_id.into(),
            state: tokio::sync::Mutex::new(HookState {
                provider: provider.into(),
                model,
                ..HookState::default()
            }),
            error_tx,
        };
        (hook, error_rx)
    }

    /// Conversation id, once the conversation has been created
    pub async fn conversation_id(&self) -> Option<String> {
        self.state.lock().await.conversation_id.clone()
    }

    /// Number of messages currently mirrored into the store
    pub async fn saved_count(&self) -> usize {
        self.state.lock().await.saved_ids.len()
    }

    fn report(&self, error: AppError) {
        warn!("Persistence failure (chat unaffected): {error}");
        let _ = self.error_tx.send(error);
    }

    /// Mirror the given history into the store
    ///
    /// Creates the conversation on first use, saves every message beyond the
    /// saved watermark, and sets the title once from the first user message.
    /// Failures abort this sync; the watermark is untouched so the next call
    /// retries.
    pub async fn sync(&self, history: &[ChatMessage]) {
        if history.is_empty() {
            return;
        }

        let conversation_id = match self.ensure_conversation().await {
            Some(id) => id,
            None => return,
        };

        let mut state = self.state.lock().await;
        while state.saved_ids.len() < history.len() {
            let index = state.saved_ids.len();
            let message = &history[index];
            match self
                .store
                .save_message(&conversation_id, message.role, &message.content)
                .await
            {
                Ok(id) => state.saved_ids.push(id),
                Err(e) => {
                    drop(state);
                    self.report(e);
                    return;
                }
            }
        }

        if !state.title_set {
            if let Some(first_user) = history.iter().find(|m| m.role == MessageRole::User) {
                let title = derive_title(&first_user.content);
                match self
                    .store
                    .update_conversation_title(&conversation_id, &title)
                    .await
                {
                    Ok(()) => state.title_set = true,
                    Err(e) => {
                        drop(state);
                        self.report(e);
                    }
                }
            }
        }
    }

    async fn ensure_conversation(&self) -> Option<String> {
        let (provider, model) = {
            let mut state = self.state.lock().await;
            if let Some(id) = &state.conversation_id {
                return Some(id.clone());
            }
            if state.initializing {
                return None;
            }
            state.initializing = true;
            (state.provider.clone(), state.model.clone())
        };

        let created = self
            .store
            .create_conversation(&self.user_id, &provider, model.as_deref())
            .await;

        let mut state = self.state.lock().await;
        state.initializing = false;
        match created {
            Ok(id) => {
                state.conversation_id = Some(id.clone());
                Some(id)
            }
            Err(e) => {
                drop(state);
                self.report(e);
                None
            }
        }
    }

    /// Reflect an edit of the user message at `index` followed by truncation
    /// of everything after it
    pub async fn handle_edit(&self, index: usize, new_content: &str) {
        let mut state = self.state.lock().await;
        let Some(conversation_id) = state.conversation_id.clone() else {
            return;
        };
        if index >= state.saved_ids.len() {
            return;
        }
        let message_id = state.saved_ids[index].clone();

        if let Err(e) = self.store.update_message(&message_id, new_content).await {
            drop(state);
            self.report(e);
            return;
        }
        if let Err(e) = self
            .store
            .delete_messages_after(&conversation_id, &message_id)
            .await
        {
            drop(state);
            self.report(e);
            return;
        }
        state.saved_ids.truncate(index + 1);
    }

    /// Record a provider/model change, updating the stored conversation when
    /// one exists
    pub async fn update_settings(&self, provider: impl Into<String>, model: Option<String>) {
        let mut state = self.state.lock().await;
        state.provider = provider.into();
        state.model = model;

        if let Some(conversation_id) = state.conversation_id.clone() {
            let provider = state.provider.clone();
            let model = state.model.clone();
            drop(state);
            if let Err(e) = self
                .store
                .update_conversation_settings(&conversation_id, &provider, model.as_deref())
                .await
            {
                self.report(e);
            }
        }
    }
}
