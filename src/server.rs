// ABOUTME: Server assembly wiring routes, registry, adapters, and auth together
// ABOUTME: Owns the shared resource bundle and the axum serve loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Server Assembly
//!
//! Everything the route handlers share lives in [`ServerResources`], built
//! once at startup and passed around as `Arc`. The registry and adapter set
//! are explicit values, not globals, so tests can inject alternates.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::llm::discovery::ModelDiscovery;
use crate::llm::AdapterSet;
use crate::providers::ProviderRegistry;
use crate::routes;

/// Shared state for all route handlers
pub struct ServerResources {
    /// Server configuration
    pub config: ServerConfig,
    /// Provider table used for entitlement checks
    pub registry: ProviderRegistry,
    /// Completion adapters keyed by provider id
    pub adapters: AdapterSet,
    /// Model discovery client for the local runtimes
    pub discovery: ModelDiscovery,
    /// Authentication boundary
    pub authenticator: Arc<dyn Authenticator>,
}

impl ServerResources {
    /// Build the production resource bundle from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn new(config: ServerConfig, authenticator: Arc<dyn Authenticator>) -> AppResult<Self> {
        let adapters = AdapterSet::standard(&config)?;
        let discovery = ModelDiscovery::new(&config)?;
        Ok(Self {
            config,
            registry: ProviderRegistry::standard(),
            adapters,
            discovery,
            authenticator,
        })
    }
}

/// Build the application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .route("/chat", post(routes::chat::chat_handler))
        .route("/models", get(routes::models::models_handler))
        .route("/health", get(routes::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(resources)
}

/// Bind the configured port and serve until shutdown
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server loop fails.
pub async fn serve(resources: Arc<ServerResources>) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], resources.config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!("tidechat listening on {addr}");

    axum::serve(listener, router(resources))
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))
}
