// ABOUTME: Persistence collaborator contract for conversations and messages
// ABOUTME: Defines the async store trait plus record types shared with callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Persistence Collaborator
//!
//! The chat core consumes storage through [`ConversationStore`]; the concrete
//! schema lives behind it. Every operation must be safe to call with a
//! conversation id that does not (yet) exist in durable storage. Callers on
//! the chat path swallow failures; see the persistence hook.

mod chat;

pub use chat::ChatStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::llm::MessageRole;

/// Stored representation of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation id
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Display title derived from the first user message
    pub title: String,
    /// Provider id active for this conversation
    pub provider: String,
    /// Model id, when the provider supports model selection
    pub model: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Bumped on every message append (ISO 8601)
    pub updated_at: String,
}

/// Stored representation of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message id
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Sender role (user or assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

/// Async storage contract for conversations and messages
///
/// Message order within a conversation is append-only by creation time.
/// Editing a user message is expressed as `update_message` plus
/// `delete_messages_after` (truncate-and-regenerate semantics).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation, returning its id
    async fn create_conversation(
        &self,
        user_id: &str,
        provider: &str,
        model: Option<&str>,
    ) -> AppResult<String>;

    /// Append a message, returning its id; bumps the conversation's
    /// `updated_at`
    async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<String>;

    /// Set the conversation's display title
    async fn update_conversation_title(&self, conversation_id: &str, title: &str) -> AppResult<()>;

    /// Update the conversation's provider/model metadata
    async fn update_conversation_settings(
        &self,
        conversation_id: &str,
        provider: &str,
        model: Option<&str>,
    ) -> AppResult<()>;

    /// Delete every message created after the given message in the same
    /// conversation
    async fn delete_messages_after(&self, conversation_id: &str, message_id: &str)
        -> AppResult<()>;

    /// Replace a message's content in place
    async fn update_message(&self, message_id: &str, content: &str) -> AppResult<()>;

    /// All messages of a conversation in append order
    async fn get_messages(&self, conversation_id: &str) -> AppResult<Vec<MessageRecord>>;

    /// Fetch a conversation by id
    async fn get_conversation(&self, conversation_id: &str)
        -> AppResult<Option<ConversationRecord>>;

    /// Delete a conversation and, cascading, its messages
    async fn delete_conversation(&self, conversation_id: &str) -> AppResult<bool>;
}
