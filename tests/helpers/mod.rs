// ABOUTME: Shared test helpers for integration tests
// ABOUTME: HTTP request builder plus router/resource construction utilities

pub mod axum_test;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::iter;

use tidechat::auth::StaticTokenAuthenticator;
use tidechat::config::ServerConfig;
use tidechat::llm::discovery::ModelDiscovery;
use tidechat::llm::{AdapterSet, ChatMessage, CompletionAdapter, StreamChunk, TextStream};
use tidechat::plans::Plan;
use tidechat::providers::ProviderRegistry;
use tidechat::server::ServerResources;

/// Adapter that records invocations and streams a scripted reply
///
/// The call counter makes "rejected before any adapter dispatch" observable.
pub struct RecordingAdapter {
    id: &'static str,
    pub calls: Arc<AtomicUsize>,
    reply: Vec<&'static str>,
}

impl RecordingAdapter {
    pub fn new(id: &'static str, reply: Vec<&'static str>) -> Self {
        Self {
            id,
            calls: Arc::new(AtomicUsize::new(0)),
            reply,
        }
    }
}

#[async_trait]
impl CompletionAdapter for RecordingAdapter {
    fn id(&self) -> &'static str {
        self.id
    }

    fn display_name(&self) -> &'static str {
        "Recording"
    }

    async fn complete_stream(&self, _messages: &[ChatMessage], _model: Option<&str>) -> TextStream {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut chunks: Vec<_> = self
            .reply
            .iter()
            .map(|part| Ok(StreamChunk::delta(*part)))
            .collect();
        chunks.push(Ok(StreamChunk::done("stop")));
        Box::pin(iter(chunks))
    }
}

/// Build server resources around the given adapters, with one token per plan
///
/// Tokens are `"basic-token"` and `"pro-token"`.
pub fn test_resources(adapters: AdapterSet) -> Arc<ServerResources> {
    let config = ServerConfig::default();
    let mut authenticator = StaticTokenAuthenticator::new();
    authenticator.add_token("basic-token", Plan::Basic);
    authenticator.add_token("pro-token", Plan::Pro);

    let discovery = ModelDiscovery::new(&config).expect("discovery client");
    Arc::new(ServerResources {
        config,
        registry: ProviderRegistry::standard(),
        adapters,
        discovery,
        authenticator: Arc::new(authenticator),
    })
}
