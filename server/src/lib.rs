use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use sift_core::scan::build_with_report;
use sift_core::{search, Corpus, DocId, EngineError, LoaderRegistry, SearchConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub suggestion: Option<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub snippet: String,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub title: String,
    pub distinct_terms: usize,
    pub norm: f64,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub num_docs: usize,
    pub num_terms: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub took_s: f64,
}

type ApiError = (StatusCode, String);

/// Shared handler state. The corpus is swapped whole on rebuild, so searches in
/// flight keep the snapshot they started with.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub registry: LoaderRegistry,
    pub config: SearchConfig,
    pub corpus: Arc<RwLock<Arc<Corpus>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    fn snapshot(&self) -> Arc<Corpus> {
        self.corpus.read().clone()
    }
}

pub fn build_app(root: impl Into<PathBuf>) -> Result<Router> {
    build_app_with(root, SearchConfig::default())
}

pub fn build_app_with(root: impl Into<PathBuf>, config: SearchConfig) -> Result<Router> {
    let root = root.into();
    let registry = LoaderRegistry::standard();
    let (corpus, _) = build_with_report(&root, &registry, &CancellationToken::new())?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState {
        root,
        registry,
        config,
        corpus: Arc::new(RwLock::new(Arc::new(corpus))),
        admin_token,
    };

    // unset or unparsable origin list means any origin
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
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let corpus = state.snapshot();
    let config = state.config;
    let query = params.q.clone();

    // dropping the handler future (client went away) cancels the ranking
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let mut result = tokio::task::spawn_blocking(move || search(&corpus, &query, &config, &cancel))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(engine_error)?;

    let total_hits = result.len();
    let k = params.k.max(1).min(100);
    result.items.truncate(k);
    let results = result
        .items
        .into_iter()
        .map(|item| SearchHit {
            snippet: highlight_terms(&item.snippet, &item.matched),
            doc_id: item.doc_id,
            score: item.score,
            title: item.title,
        })
        .collect();

    let took_s = start.elapsed().as_secs_f64();
    tracing::info!(query = %params.q, total_hits, took_s, "search served");
    Ok(Json(SearchResponse { query: params.q, took_s, total_hits, suggestion: result.suggestion, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocResponse>, ApiError> {
    let corpus = state.snapshot();
    let vector = corpus
        .document(doc_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no document {doc_id}")))?;
    Ok(Json(DocResponse {
        doc_id,
        title: corpus.title(doc_id),
        distinct_terms: vector.terms.len(),
        norm: vector.norm,
    }))
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildResponse>, ApiError> {
    authorize(&state, &headers)?;
    let start = Instant::now();
    let root = state.root.clone();
    let registry = state.registry.clone();
    let (corpus, report) = tokio::task::spawn_blocking(move || build_with_report(&root, &registry, &CancellationToken::new()))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(engine_error)?;

    let response = RebuildResponse {
        num_docs: corpus.num_documents(),
        num_terms: corpus.num_terms(),
        unsupported: report.unsupported,
        failed: report.failed,
        took_s: start.elapsed().as_secs_f64(),
    };
    *state.corpus.write() = Arc::new(corpus);
    tracing::info!(num_docs = response.num_docs, "corpus swapped");
    Ok(Json(response))
}

fn engine_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::NotADirectory(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Wrap every whole-word, case-insensitive occurrence of `terms` in `<em>`.
fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut alternatives: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).map(|t| regex::escape(t)).collect();
    if alternatives.is_empty() {
        return snippet.to_string();
    }
    alternatives.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(pat) => pat.replace_all(snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "highlight pattern rejected");
            snippet.to_string()
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
