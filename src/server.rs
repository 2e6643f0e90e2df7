//! HTTP JSON API.
//!
//! Exposes upload, question answering, and reset over a small JSON API that
//! a chat front end can drive directly.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload-pdfs/` | Multipart upload (`files` parts); replaces the current document set |
//! | `POST` | `/ask-question/` | `{"question": "..."}` → `{answer, sources, mode}` |
//! | `POST` | `/clear-rag/` | Forget the current document set |
//! | `GET`  | `/health` | Health check (version and whether documents are loaded) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Question cannot be empty", "code": "empty_question" }
//! ```
//!
//! Codes: `empty_upload`, `empty_question`, `bad_request` (400);
//! `document_parse`, `empty_index` (422); `embedding`, `synthesis` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end on
//! another port can call the API.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pdfqa_core::engine;
use pdfqa_core::session::SessionStore;
use pdfqa_core::RagError;

use crate::config::Config;
use crate::ingest::{ingest, FileSummary, Pipeline, UploadedFile};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The single live document binding.
    store: Arc<SessionStore>,
    /// Embedder, language model, and retrieval parameters for new ingestions.
    pipeline: Arc<Pipeline>,
    /// Serialises uploads so replacements land in arrival order.
    ingest_lock: Arc<Mutex<()>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Pipeline, max_upload_bytes: usize) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            pipeline: Arc::new(pipeline),
            ingest_lock: Arc::new(Mutex::new(())),
            max_upload_bytes,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Build the router with all routes, CORS, request tracing, and the upload
/// size limit.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload-pdfs/", post(handle_upload))
        .route("/ask-question/", post(handle_ask))
        .route("/clear-rag/", post(handle_clear))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Pipeline) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        llm = pipeline.llm.model_name(),
        embedder = pipeline.embedder.model_name(),
        "server listening"
    );
    serve(listener, AppState::new(pipeline, config.server.max_upload_bytes)).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    /// Human-readable error message.
    error: String,
    /// Machine-readable error code (e.g., `"empty_question"`).
    code: &'static str,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::EmptyUpload | RagError::EmptyQuestion => StatusCode::BAD_REQUEST,
            RagError::DocumentParse { .. }
            | RagError::EmptyIndex
            | RagError::IndexMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Embedding(_)
            | RagError::DimensionMismatch { .. }
            | RagError::Synthesis(_) => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

// ============ POST /upload-pdfs/ ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    files: Vec<FileSummary>,
    pages: usize,
}

/// Handler for `POST /upload-pdfs/`.
///
/// Every multipart part named `files` (or carrying a file name) is one PDF.
/// Returns `400` when no file was sent, `422` when a file cannot be parsed or
/// no page has text, and `502` when embedding fails. A failed upload leaves
/// the previous documents in place.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let is_file = field.name() == Some("files") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}.pdf", files.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read '{}': {}", name, e)))?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    let _guard = state.ingest_lock.lock().await;
    let report = ingest(files, &state.pipeline, &state.store).await?;
    tracing::info!(files = report.files.len(), pages = report.pages, "upload indexed");

    Ok(Json(UploadResponse {
        message: report.message(),
        files: report.files,
        pages: report.pages,
    }))
}

// ============ POST /ask-question/ ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    /// Page tags such as `"Page 2 (report.pdf)"`, most relevant first.
    sources: Vec<String>,
    /// `direct`, `retrieved`, or `fallback`.
    mode: &'static str,
}

/// Handler for `POST /ask-question/`.
///
/// Answers from the loaded documents when there are any, otherwise from the
/// model alone. Returns `400` for a missing or blank question or a body that
/// is not a JSON object, and `502` only when even the bare-question call fails.
async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let question = req.question.unwrap_or_default();
    let result = engine::ask(
        &state.store,
        state.pipeline.llm.as_ref(),
        state.pipeline.params.direct_temperature,
        &question,
    )
    .await?;

    Ok(Json(AskResponse {
        answer: result.answer().to_string(),
        sources: result.sources().iter().map(|p| p.tag()).collect(),
        mode: result.mode(),
    }))
}

// ============ POST /clear-rag/ ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Handler for `POST /clear-rag/`. Always succeeds.
async fn handle_clear(State(state): State<AppState>) -> Json<MessageResponse> {
    state.store.clear();
    Json(MessageResponse {
        message: "RAG cleared".to_string(),
    })
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// Whether a document set is loaded.
    ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: state.store.is_ready(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_errors_map_to_client_statuses() {
        let err = AppError::from(RagError::EmptyUpload);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "empty_upload");

        let err = AppError::from(RagError::parse("a.pdf", "bad xref"));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("a.pdf"));

        let err = AppError::from(RagError::EmptyIndex);
        assert_eq!(err.code, "empty_index");
    }

    #[test]
    fn service_errors_map_to_bad_gateway() {
        let err = AppError::from(RagError::synthesis("quota exceeded"));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "synthesis");
    }
}
