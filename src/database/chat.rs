// ABOUTME: SQLite-backed conversation store using sqlx
// ABOUTME: Owns schema creation and the SQL behind the ConversationStore trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use super::{ConversationRecord, ConversationStore, MessageRecord};
use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;

/// SQLite implementation of [`ConversationStore`]
///
/// Message ordering relies on `rowid`, which SQLite assigns monotonically on
/// insert; `created_at` alone is not enough since two messages can share a
/// timestamp.
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Open (or create) the database at the given URL and run schema setup
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let store = Self::with_pool(database_url, 5).await?;
        info!("Chat store ready at {database_url}");
        Ok(store)
    }

    /// In-memory store for tests
    ///
    /// Capped at one connection: every pooled connection to `:memory:` opens
    /// its own database, so a larger pool would scatter the tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub async fn in_memory() -> AppResult<Self> {
        Self::with_pool("sqlite::memory:", 1).await
    }

    async fn with_pool(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT 'New Conversation',
                provider TEXT NOT NULL,
                model TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages(conversation_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message index: {e}")))?;

        Ok(())
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> ConversationRecord {
        ConversationRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            provider: row.get("provider"),
            model: row.get("model"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> MessageRecord {
        MessageRecord {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            role: row.get("role"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ConversationStore for ChatStore {
    async fn create_conversation(
        &self,
        user_id: &str,
        provider: &str,
        model: Option<&str>,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO conversations (id, user_id, provider, model, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(provider)
        .bind(model)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(id)
    }

    async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to save message: {e}")))?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch conversation: {e}")))?;

        Ok(id)
    }

    async fn update_conversation_title(&self, conversation_id: &str, title: &str) -> AppResult<()> {
        sqlx::query("UPDATE conversations SET title = ? WHERE id = ?")
            .bind(title)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update title: {e}")))?;
        Ok(())
    }

    async fn update_conversation_settings(
        &self,
        conversation_id: &str,
        provider: &str,
        model: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE conversations SET provider = ?, model = ? WHERE id = ?")
            .bind(provider)
            .bind(model)
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update settings: {e}")))?;
        Ok(())
    }

    async fn delete_messages_after(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> AppResult<()> {
        // No-op when the anchor message is unknown; the subquery yields NULL
        // and the comparison excludes every row.
        sqlx::query(
            "DELETE FROM messages
             WHERE conversation_id = ?
               AND rowid > (SELECT rowid FROM messages WHERE id = ? AND conversation_id = ?)",
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to truncate messages: {e}")))?;
        Ok(())
    }

    async fn update_message(&self, message_id: &str, content: &str) -> AppResult<()> {
        sqlx::query("UPDATE messages SET content = ? WHERE id = ?")
            .bind(content)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update message: {e}")))?;
        Ok(())
    }

    async fn get_messages(&self, conversation_id: &str) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages WHERE conversation_id = ? ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load messages: {e}")))?;

        Ok(rows.iter().map(Self::row_to_message).collect())
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, provider, model, created_at, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load conversation: {e}")))?;

        Ok(row.as_ref().map(Self::row_to_conversation))
    }

    async fn delete_conversation(&self, conversation_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
