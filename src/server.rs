//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer the last user message of a conversation |
//! | `POST` | `/api/embeddings/ingest` | Rebuild the index from the supplied events |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "messages must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502), `internal` (500).
//! Upstream and internal failures are logged with their full cause chain;
//! the response carries only a fixed message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use evrag_core::index::Indexer;
use evrag_core::models::{Event, QueryResponse};
use evrag_core::pipeline::{QueryPipeline, QueryRequest};
use evrag_core::store::EventStore;
use evrag_core::{ErrorKind, RagError};

use crate::app::App;
use crate::config::Config;

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: QueryPipeline,
    /// Shared so concurrent ingest requests queue on its reindex lock.
    indexer: Arc<Indexer>,
    events: Arc<dyn EventStore>,
}

/// Start the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::open(config).await?;
    let state = AppState {
        pipeline: app.pipeline()?,
        indexer: Arc::new(app.indexer()?),
        events: app.store.clone(),
    };

    let router = router(state);
    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!(
        bind = %bind_addr,
        embedding = %config.embedding.provider,
        completion = %config.completion.provider,
        "server listening"
    );
    println!("evrag server listening on http://{}", bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/embeddings/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match err.kind() {
            ErrorKind::BadInput => (StatusCode::BAD_REQUEST, "bad_request"),
            ErrorKind::Upstream => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        match err.kind() {
            ErrorKind::BadInput => warn!(error = %err, "request rejected"),
            _ => error!(error = %err, stage = ?err.stage(), "request failed"),
        }
        AppError {
            status,
            code,
            message: err.user_message(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = ?err, "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "internal server error".to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let response = state.pipeline.run(&request).await?;
    Ok(Json(response))
}

// ============ POST /api/embeddings/ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Serialize)]
struct IngestResponse {
    inserted: usize,
}

/// Record the supplied events in the event store, then rebuild the index
/// from them. The upsert runs first so a committed index never refers to
/// events the store cannot resolve.
async fn handle_ingest(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    if request.events.is_empty() {
        return Err(RagError::InvalidInput("events must not be empty".to_string()).into());
    }
    state.events.upsert_events(&request.events).await?;
    let inserted = state.indexer.reindex(&request.events).await?;
    info!(events = request.events.len(), inserted, "ingest complete");
    Ok(Json(IngestResponse { inserted }))
}
