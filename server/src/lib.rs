use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::HeaderMap, routing::{get, post}, Json, Router};
use hybrid_core::hybrid::{bm25_results, HybridSearch};
use hybrid_core::persist::{load_index, IndexPaths};
use hybrid_core::semantic::{ChunkStore, ChunkedSemanticSearch, QueryVector};
use hybrid_core::{DocId, Document, InvertedIndex, SearchConfig, SearchError, SearchResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};

pub mod errors;

use errors::ApiError;

const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct HybridRequest {
    pub query: String,
    /// Embedding of `query`, computed by the caller.
    pub vector: Vec<f32>,
    pub alpha: Option<f64>,
    pub k: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct HybridResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<f64>,
    pub took_s: f64,
    pub results: Vec<SearchResult>,
}

/// Everything a query reads. Never mutated once loaded.
pub struct Snapshot {
    pub index: InvertedIndex,
    pub chunks: Option<ChunkStore>,
}

impl Snapshot {
    pub fn load(paths: &IndexPaths) -> Result<Self, SearchError> {
        let index = load_index(paths)?;
        let chunks = match ChunkStore::load(&paths.chunk_embeddings()) {
            Ok(store) => Some(store),
            Err(SearchError::SemanticUnavailable(reason)) => {
                tracing::warn!(%reason, "hybrid endpoints disabled");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self { index, chunks })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub snapshot: Arc<RwLock<Arc<Snapshot>>>,
    pub config: Arc<SearchConfig>,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Clone the current snapshot handle; the lock is held only for the clone.
    fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }
}

pub fn build_app(index_dir: String, config: SearchConfig) -> Result<Router> {
    build_app_with_token(index_dir, config, std::env::var("ADMIN_TOKEN").ok())
}

pub fn build_app_with_token(index_dir: String, config: SearchConfig, admin_token: Option<String>) -> Result<Router> {
    // Load index snapshot at startup
    let paths = IndexPaths::new(&index_dir);
    let snapshot = Snapshot::load(&paths)?;
    tracing::info!(num_docs = snapshot.index.len(), semantic = snapshot.chunks.is_some(), "index snapshot ready");
    let app_state = AppState {
        index_paths_root: PathBuf::from(&index_dir),
        snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        config: Arc::new(config),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/search/weighted", post(weighted_handler))
        .route("/search/rrf", post(rrf_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors);
    Ok(app)
}

/// Zero is passed through and yields no results, same as the library.
fn clamp_limit(limit: Option<usize>, config: &SearchConfig) -> usize {
    limit.unwrap_or(config.default_limit).min(MAX_LIMIT)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let snapshot = state.current();
    let limit = clamp_limit(params.limit, &state.config);
    let mut results = bm25_results(&snapshot.index, &params.q, usize::MAX, &state.config);
    let total_hits = results.len();
    results.truncate(limit);
    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn weighted_handler(State(state): State<AppState>, Json(req): Json<HybridRequest>) -> Result<Json<HybridResponse>, ApiError> {
    let start = std::time::Instant::now();
    let snapshot = state.current();
    let alpha = req.alpha.unwrap_or(state.config.alpha);
    let limit = clamp_limit(req.limit, &state.config);
    let results = with_hybrid(&state, &snapshot, req.vector, |hybrid| hybrid.weighted_search(&req.query, alpha, limit))?;
    Ok(Json(HybridResponse { query: req.query, alpha: Some(alpha), k: None, took_s: start.elapsed().as_secs_f64(), results }))
}

pub async fn rrf_handler(State(state): State<AppState>, Json(req): Json<HybridRequest>) -> Result<Json<HybridResponse>, ApiError> {
    let start = std::time::Instant::now();
    let snapshot = state.current();
    let k = req.k.unwrap_or(state.config.rrf_k);
    let limit = clamp_limit(req.limit, &state.config);
    let results = with_hybrid(&state, &snapshot, req.vector, |hybrid| hybrid.rrf_search(&req.query, k, limit))?;
    Ok(Json(HybridResponse { query: req.query, alpha: None, k: Some(k), took_s: start.elapsed().as_secs_f64(), results }))
}

fn with_hybrid<F>(state: &AppState, snapshot: &Snapshot, vector: Vec<f32>, run: F) -> Result<Vec<SearchResult>, ApiError>
where
    F: FnOnce(&HybridSearch<'_, ChunkedSemanticSearch<'_, QueryVector>>) -> Result<Vec<SearchResult>, SearchError>,
{
    let chunks = snapshot
        .chunks
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("no chunk embeddings loaded".into()))?;
    let embedder = QueryVector(vector);
    let semantic = ChunkedSemanticSearch::new(&embedder, chunks, &snapshot.index).with_snippet_chars(state.config.snippet_chars);
    let hybrid = HybridSearch::new(&snapshot.index, &semantic, (*state.config).clone());
    Ok(run(&hybrid)?)
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<Document>, ApiError> {
    let snapshot = state.current();
    snapshot
        .index
        .document(doc_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::from(SearchError::UnknownDocument(doc_id)))
}

/// Load a freshly built index from disk and swap it in for new requests.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_paths_root);
    let snapshot = Snapshot::load(&paths)?;
    let num_docs = snapshot.index.len();
    let semantic = snapshot.chunks.is_some();
    *state.snapshot.write() = Arc::new(snapshot);
    tracing::info!(num_docs, semantic, "index reloaded");
    Ok(Json(serde_json::json!({ "num_docs": num_docs, "semantic": semantic })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token".into()))
    }
}
