//! HTTP API gateway for PaperChat.
//!
//! Exposes document upload, chat, session and collection endpoints.
//!
//! Built on Axum.

pub mod api;
pub mod error;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use paperchat_chain::{ChainOrchestrator, Generator};
use paperchat_config::AppConfig;
use paperchat_core::{Error, Result};
use paperchat_index::IndexManager;
use paperchat_ingest::{Ingestor, RecursiveCharacterSplitter};
use paperchat_memory::ConversationMemory;
use paperchat_providers::ProviderEmbedder;

pub use error::ApiError;

/// Shared application state for the gateway.
pub struct AppState {
    pub chain: Arc<ChainOrchestrator>,
    pub ingestor: Arc<Ingestor>,
    /// Request body limit, also the largest accepted upload
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(chain: Arc<ChainOrchestrator>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            chain,
            ingestor,
            max_upload_bytes: 20 * 1024 * 1024,
            cors_origins: Vec::new(),
        }
    }

    /// Build providers, index, memory, chain and ingestor from config.
    ///
    /// Builds everything once and shares it via `Arc`.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let router = paperchat_providers::build_from_config(config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("provider '{}' is not configured", config.default_provider),
        })?;
        let embedding_provider = router.get(config.embedding_provider()).ok_or_else(|| Error::Config {
            message: format!(
                "embedding provider '{}' is not configured",
                config.embedding_provider()
            ),
        })?;

        let embedder = Arc::new(ProviderEmbedder::new(
            embedding_provider,
            &config.embedding.model,
            config.embedding.batch_size,
        ));
        let index = Arc::new(
            IndexManager::new(config.index_root(), embedder)
                .with_default_collection(&config.index.default_collection)
                .with_timeouts(config.timeouts.embedding(), config.timeouts.storage()),
        );

        let backend = paperchat_memory::connect(&config.history_url()).await?;
        let memory = Arc::new(
            ConversationMemory::new(backend)
                .with_preview_chars(config.history.preview_chars)
                .with_timeout(config.timeouts.storage()),
        );

        let generator = Arc::new(
            Generator::new(provider, &config.default_model)
                .with_temperature(config.default_temperature)
                .with_max_tokens(config.default_max_tokens)
                .with_timeout(config.timeouts.generation()),
        );
        let chain = Arc::new(
            ChainOrchestrator::new(generator, index.clone(), memory)
                .with_top_k(config.retrieval.top_k),
        );

        let splitter =
            RecursiveCharacterSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
        let ingestor = Arc::new(Ingestor::new(index, splitter));

        info!(
            provider = %config.default_provider,
            model = %config.default_model,
            embedding_model = %config.embedding.model,
            history = chain.memory().backend_name(),
            "Services initialized"
        );

        Ok(Self {
            chain,
            ingestor,
            max_upload_bytes: config.ingest.max_upload_bytes,
            cors_origins: config.gateway.cors_origins.clone(),
        })
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        self.chain.memory()
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        self.chain.index()
    }
}

/// Build the Axum router with all routes.
///
/// Layers applied:
/// - Request body size limit (`max_upload_bytes`)
/// - CORS for the configured origins, when any are configured
/// - HTTP trace logging
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    let cors = cors_layer(&state.cors_origins);

    let router = Router::new()
        .route("/health", get(api::health_handler))
        .route("/upload", post(api::upload_handler))
        .route("/chat", post(api::chat_handler))
        .route("/sessions", get(api::list_sessions_handler))
        .route(
            "/sessions/{id}",
            get(api::session_history_handler).delete(api::clear_session_handler),
        )
        .route("/sessions/{id}/stats", get(api::session_stats_handler))
        .route("/collections", get(api::list_collections_handler))
        .route("/collections/{name}", delete(api::delete_collection_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState::from_config(&config).await?);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
