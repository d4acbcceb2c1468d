// ABOUTME: End-to-end tests for the client session with persistence attached
// ABOUTME: Verifies lazy creation, incremental saves, title rules, and failure isolation

use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::iter;

use tidechat::client::{ChatSession, CompletionTransport, PersistenceHook, SessionState};
use tidechat::database::{ChatStore, ConversationStore};
use tidechat::errors::{AppError, AppResult};
use tidechat::llm::{MessageRole, StreamChunk, TextStream};
use tidechat::routes::ChatRequest;

struct ScriptedTransport {
    reply: Vec<&'static str>,
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn stream_completion(&self, _request: &ChatRequest) -> AppResult<TextStream> {
        let mut chunks: Vec<AppResult<StreamChunk>> = self
            .reply
            .iter()
            .map(|part| Ok(StreamChunk::delta(*part)))
            .collect();
        chunks.push(Ok(StreamChunk::done("stop")));
        Ok(Box::pin(iter(chunks)))
    }
}

fn transport(reply: Vec<&'static str>) -> Arc<dyn CompletionTransport> {
    Arc::new(ScriptedTransport { reply })
}

/// Store whose every operation fails, for exercising the error channel
struct BrokenStore;

#[async_trait]
impl ConversationStore for BrokenStore {
    async fn create_conversation(
        &self,
        _user_id: &str,
        _provider: &str,
        _model: Option<&str>,
    ) -> AppResult<String> {
        Err(AppError::database("disk full"))
    }

    async fn save_message(
        &self,
        _conversation_id: &str,
        _role: MessageRole,
        _content: &str,
    ) -> AppResult<String> {
        Err(AppError::database("disk full"))
    }

    async fn update_conversation_title(
        &self,
        _conversation_id: &str,
        _title: &str,
    ) -> AppResult<()> {
        Err(AppError::database("disk full"))
    }

    async fn update_conversation_settings(
        &self,
        _conversation_id: &str,
        _provider: &str,
        _model: Option<&str>,
    ) -> AppResult<()> {
        Err(AppError::database("disk full"))
    }

    async fn delete_messages_after(
        &self,
        _conversation_id: &str,
        _message_id: &str,
    ) -> AppResult<()> {
        Err(AppError::database("disk full"))
    }

    async fn update_message(&self, _message_id: &str, _content: &str) -> AppResult<()> {
        Err(AppError::database("disk full"))
    }

    async fn get_messages(
        &self,
        _conversation_id: &str,
    ) -> AppResult<Vec<tidechat::database::MessageRecord>> {
        Err(AppError::database("disk full"))
    }

    async fn get_conversation(
        &self,
        _conversation_id: &str,
    ) -> AppResult<Option<tidechat::database::ConversationRecord>> {
        Err(AppError::database("disk full"))
    }

    async fn delete_conversation(&self, _conversation_id: &str) -> AppResult<bool> {
        Err(AppError::database("disk full"))
    }
}

#[tokio::test]
async fn test_submit_lazily_creates_conversation_with_title() {
    let store: Arc<dyn ConversationStore> = Arc::new(ChatStore::in_memory().await.unwrap());
    let (hook, _errors) = PersistenceHook::new(Arc::clone(&store), "user-1", "ollama", None);
    let hook = Arc::new(hook);

    let session = ChatSession::new(
        transport(vec!["I can help", " with many things."]),
        "ollama",
        None,
        Some(Arc::clone(&hook)),
    );

    session
        .submit("What can you help me with today?")
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Completed);

    let conv = hook.conversation_id().await.expect("conversation created");
    let record = store.get_conversation(&conv).await.unwrap().unwrap();
    assert_eq!(record.title, "What can you help me with today?");
    assert_eq!(record.user_id, "user-1");

    let messages = store.get_messages(&conv).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "What can you help me with today?");
    assert_eq!(messages[1].content, "I can help with many things.");
}

#[tokio::test]
async fn test_saves_are_incremental_across_turns() {
    let store: Arc<dyn ConversationStore> = Arc::new(ChatStore::in_memory().await.unwrap());
    let (hook, _errors) = PersistenceHook::new(Arc::clone(&store), "user-1", "ollama", None);
    let hook = Arc::new(hook);

    let session = ChatSession::new(
        transport(vec!["reply"]),
        "ollama",
        None,
        Some(Arc::clone(&hook)),
    );

    session.submit("first").await.unwrap();
    assert_eq!(hook.saved_count().await, 2);

    session.submit("second").await.unwrap();
    assert_eq!(hook.saved_count().await, 4);

    let conv = hook.conversation_id().await.unwrap();
    let contents: Vec<String> = store
        .get_messages(&conv)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["first", "reply", "second", "reply"]);
}

#[tokio::test]
async fn test_edit_and_regenerate_truncates_store_and_keeps_title() {
    let store: Arc<dyn ConversationStore> = Arc::new(ChatStore::in_memory().await.unwrap());
    let (hook, _errors) = PersistenceHook::new(Arc::clone(&store), "user-1", "ollama", None);
    let hook = Arc::new(hook);

    let session = ChatSession::new(
        transport(vec!["reply"]),
        "ollama",
        None,
        Some(Arc::clone(&hook)),
    );

    session.submit("original question").await.unwrap();
    session.submit("follow up").await.unwrap();

    session
        .edit_and_regenerate(0, "revised question")
        .await
        .unwrap();

    let conv = hook.conversation_id().await.unwrap();
    let contents: Vec<String> = store
        .get_messages(&conv)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["revised question", "reply"]);

    // Title is generated once, from the first message as originally sent
    let record = store.get_conversation(&conv).await.unwrap().unwrap();
    assert_eq!(record.title, "original question");
}

#[tokio::test]
async fn test_settings_change_updates_stored_conversation() {
    let store: Arc<dyn ConversationStore> = Arc::new(ChatStore::in_memory().await.unwrap());
    let (hook, _errors) = PersistenceHook::new(Arc::clone(&store), "user-1", "ollama", None);
    let hook = Arc::new(hook);

    let session = ChatSession::new(
        transport(vec!["reply"]),
        "ollama",
        None,
        Some(Arc::clone(&hook)),
    );

    session.submit("hello").await.unwrap();
    session
        .set_settings("local-llm", Some("gemma-2-9b".to_owned()))
        .await;

    let conv = hook.conversation_id().await.unwrap();
    let record = store.get_conversation(&conv).await.unwrap().unwrap();
    assert_eq!(record.provider, "local-llm");
    assert_eq!(record.model.as_deref(), Some("gemma-2-9b"));
}

#[tokio::test]
async fn test_persistence_failure_never_breaks_the_chat() {
    let (hook, mut errors) = PersistenceHook::new(Arc::new(BrokenStore), "user-1", "ollama", None);

    let session = ChatSession::new(
        transport(vec!["still ", "works"]),
        "ollama",
        None,
        Some(Arc::new(hook)),
    );

    session.submit("hello").await.unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.history()[1].content, "still works");

    let error = errors.recv().await.expect("failure reported on channel");
    assert!(error.to_string().contains("disk full"));
}
