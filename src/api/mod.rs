use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregator::ResultAggregator;
use crate::config::Config;
use crate::fetch_indexer::FetchIndexer;
use crate::index_store::{IndexStore, MemoryIndexStore};
use crate::models::{ModelCatalog, OllamaModelCatalog};
use crate::page_source::{HttpPageSource, PageSource};
use crate::pipeline::WebSearchTool;
use crate::registry::SessionLinkRegistry;
use crate::search::{SearchEngine, SearxngClient};

pub mod handlers;
pub mod models;

/// Everything a request handler needs, shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionLinkRegistry>,
    pub store: Arc<dyn IndexStore>,
    pub tool: Arc<WebSearchTool>,
    pub models: Arc<dyn ModelCatalog>,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn assemble(
        config: Config,
        engine: Arc<dyn SearchEngine>,
        pages: Arc<dyn PageSource>,
        store: Arc<dyn IndexStore>,
        models: Arc<dyn ModelCatalog>,
        shutdown: CancellationToken,
    ) -> AppState {
        let registry = Arc::new(SessionLinkRegistry::new());
        let indexer = FetchIndexer::new(
            registry.clone(),
            pages,
            store.clone(),
            config.max_sources,
            config.fetch_concurrency,
        );
        let aggregator = ResultAggregator::new(store.clone(), config.top_k);
        let tool = WebSearchTool::new(engine, indexer, aggregator);

        AppState {
            config: Arc::new(config),
            registry,
            store,
            tool: Arc::new(tool),
            models,
            shutdown,
        }
    }

    /// Wires the production collaborators: SearXNG, plain HTTP page
    /// downloads, the in-memory index, and Ollama for model names.
    pub fn from_config(config: Config, shutdown: CancellationToken) -> Result<AppState> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gleaner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let engine = SearxngClient::new(client.clone(), &config.searxng_domain, config.fetch_timeout);
        let pages = HttpPageSource::new(client.clone(), config.fetch_timeout);
        let store = MemoryIndexStore::new(config.chunk_words);
        let models = OllamaModelCatalog::new(client, &config.ollama_host);

        Ok(Self::assemble(
            config,
            Arc::new(engine),
            Arc::new(pages),
            Arc::new(store),
            Arc::new(models),
            shutdown,
        ))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // The CORS layer answers every OPTIONS request with 200 on its own.
    Router::new()
        .route("/stream", get(handlers::stream_handler))
        .route("/modellist", get(handlers::modellist_handler))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
}
