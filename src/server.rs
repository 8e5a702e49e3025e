//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/embedding` | Embed `{text}` and return the vector |
//! | `POST` | `/embedding/upload` | Ingest a PDF sent as the raw request body |
//! | `POST` | `/embedding/from-folder` | Ingest the file at `{filePath}` |
//! | `POST` | `/embedding/process-directory` | Ingest every matching file in `{directoryPath}` |
//! | `DELETE` | `/embedding/reset` | Drop the collection and recreate its schema |
//! | `POST` | `/query` | Answer `{query, topK?}` from retrieved context |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! `code` is the failing component's error kind (`embedding_error`,
//! `store_query_error`, ...) or one of `bad_request`, `not_found`,
//! `embeddings_disabled`, `generation_disabled`, `timeout`, `internal`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser UI can
//! call the API directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use lexrag_core::error::{
    EmbeddingError, GenerationError, IngestionError, RetrievalError, StoreAdminError,
};
use lexrag_core::ingest::IngestReport;
use lexrag_core::retrieve::{answer, Answer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::app::App;
use crate::extract::ExtractError;
use crate::ingest::{ingest_directory, ingest_file, ingest_upload, FileIngestError, FileOutcome};

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the router over a shared [`App`].
pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/embedding", post(handle_embed))
        .route("/embedding/upload", post(handle_upload))
        .route("/embedding/from-folder", post(handle_from_folder))
        .route("/embedding/process-directory", post(handle_process_directory))
        .route("/embedding/reset", delete(handle_reset))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(app)
}

/// Ensure the collection schema, then serve until the process is terminated.
pub async fn run_server(app: Arc<App>) -> anyhow::Result<()> {
    app.ingestor.ensure_schema().await?;
    if !app.config.embedding.is_enabled() {
        warn!("embedding provider is disabled; ingestion and queries will be rejected");
    }

    let bind_addr = app.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "lexrag server listening");

    axum::serve(listener, router(app)).await?;
    Ok(())
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

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = %self.code, message = %self.message, "request failed");
        } else {
            warn!(code = %self.code, message = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<EmbeddingError> for AppError {
    fn from(e: EmbeddingError) -> Self {
        match &e {
            EmbeddingError::Disabled => {
                AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", e.to_string())
            }
            EmbeddingError::Timeout(_) => {
                AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", e.to_string())
            }
            _ => AppError::new(StatusCode::BAD_GATEWAY, e.kind(), e.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        match &e {
            GenerationError::Disabled => {
                AppError::new(StatusCode::BAD_REQUEST, "generation_disabled", e.to_string())
            }
            GenerationError::Timeout(_) => {
                AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", e.to_string())
            }
            _ => AppError::new(StatusCode::BAD_GATEWAY, e.kind(), e.to_string()),
        }
    }
}

impl From<RetrievalError> for AppError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::EmptyQuery => bad_request("query must not be empty"),
            RetrievalError::Embedding(inner) => inner.into(),
            RetrievalError::Generation(inner) => inner.into(),
            RetrievalError::Query(inner) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, inner.kind(), inner.to_string())
            }
        }
    }
}

impl From<StoreAdminError> for AppError {
    fn from(e: StoreAdminError) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, e.kind(), e.to_string())
    }
}

impl From<FileIngestError> for AppError {
    fn from(e: FileIngestError) -> Self {
        let status = match &e {
            FileIngestError::Extract(ExtractError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                StatusCode::NOT_FOUND
            }
            _ if e.is_client_error() => StatusCode::BAD_REQUEST,
            FileIngestError::Ingest(
                IngestionError::DocumentEmbedding { error, .. }
                | IngestionError::ChunkEmbedding { error, .. },
            ) => match error {
                EmbeddingError::Disabled => StatusCode::BAD_REQUEST,
                EmbeddingError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, e.kind(), e.to_string())
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

// ============ POST /embedding ============

#[derive(Deserialize)]
struct EmbedRequest {
    text: String,
}

#[derive(Serialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

async fn handle_embed(
    State(app): State<Arc<App>>,
    Json(req): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let embedding = app.embedder.embed(&req.text).await?;
    Ok(Json(EmbedResponse { embedding }))
}

// ============ POST /embedding/upload ============

async fn handle_upload(
    State(app): State<Arc<App>>,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must contain a PDF"));
    }
    let report = ingest_upload(&app.ingestor, body.to_vec()).await?;
    Ok(Json(report))
}

// ============ POST /embedding/from-folder ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FromFolderRequest {
    file_path: PathBuf,
}

async fn handle_from_folder(
    State(app): State<Arc<App>>,
    Json(req): Json<FromFolderRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let report = ingest_file(&app.ingestor, &req.file_path).await?;
    Ok(Json(report))
}

// ============ POST /embedding/process-directory ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessDirectoryRequest {
    directory_path: PathBuf,
}

async fn handle_process_directory(
    State(app): State<Arc<App>>,
    Json(req): Json<ProcessDirectoryRequest>,
) -> Result<Json<Vec<FileOutcome>>, AppError> {
    if !req.directory_path.is_dir() {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("directory not found: {}", req.directory_path.display()),
        ));
    }
    let outcomes = ingest_directory(
        &app.ingestor,
        &req.directory_path,
        &app.config.ingest.extensions,
        app.config.ingest.concurrency,
    )
    .await
    .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()))?;
    Ok(Json(outcomes))
}

// ============ DELETE /embedding/reset ============

#[derive(Serialize)]
struct ResetResponse {
    message: String,
}

async fn handle_reset(State(app): State<Arc<App>>) -> Result<Json<ResetResponse>, AppError> {
    let collection = &app.config.store.collection;
    warn!(collection = %collection, "resetting collection");
    app.ingestor.reset().await?;
    Ok(Json(ResetResponse {
        message: format!("{} schema and all data deleted.", collection),
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_query(
    State(app): State<Arc<App>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, AppError> {
    info!(query = %req.query, "processing query");
    let params = app.retrieve_params(req.top_k);
    let result = answer(
        app.embedder.as_ref(),
        app.store.as_ref(),
        app.generator.as_ref(),
        &req.query,
        &params,
    )
    .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use lexrag_core::embedding::EmbeddingClient;
    use lexrag_core::generation::GenerationClient;
    use lexrag_core::store::memory::InMemoryStore;
    use tower::ServiceExt;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingClient for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl GenerationClient for FixedGenerator {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("It depends on the lease.".to_string())
        }
    }

    async fn test_app(embedder: Arc<dyn EmbeddingClient>) -> Arc<App> {
        let config = parse_config("[store]\npath = \"unused.sqlite\"\n").unwrap();
        let app = App::with_clients(
            config,
            embedder,
            Arc::new(FixedGenerator),
            Arc::new(InMemoryStore::default()),
        );
        app.ingestor.ensure_schema().await.unwrap();
        Arc::new(app)
    }

    async fn call(app: Arc<App>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router(app).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_embed_endpoint() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        let (status, json) = call(app, post_json("/embedding", serde_json::json!({"text": "abc"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["embedding"], serde_json::json!([3.0, 1.0]));
    }

    #[tokio::test]
    async fn test_embed_disabled_is_bad_request() {
        let app = test_app(Arc::new(crate::embedding::DisabledEmbedder)).await;
        let (status, json) = call(app, post_json("/embedding", serde_json::json!({"text": "abc"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "embeddings_disabled");
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        let (status, json) = call(app, post_json("/query", serde_json::json!({"query": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_query_returns_answer_and_sources() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        app.ingestor
            .ingest_text("/docs/lease.txt", "lease", "The tenant pays rent monthly.")
            .await
            .unwrap();

        let (status, json) = call(
            app,
            post_json("/query", serde_json::json!({"query": "When is rent due?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "It depends on the lease.");
        let sources = json["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["sourceFile"], "/docs/lease.txt");
        assert_eq!(sources[0]["pageNumber"], 1);
        assert!(sources[0].get("distance").is_some());
    }

    #[tokio::test]
    async fn test_from_folder_missing_file_is_not_found() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        let (status, json) = call(
            app,
            post_json(
                "/embedding/from-folder",
                serde_json::json!({"filePath": "/nonexistent/contract.pdf"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "io_error");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        let request = Request::builder()
            .method("POST")
            .uri("/embedding/upload")
            .header("content-type", "application/pdf")
            .body(Body::from("definitely not a pdf"))
            .unwrap();
        let (status, json) = call(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "extraction_error");
    }

    #[tokio::test]
    async fn test_process_directory_reports_each_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Rent is due monthly.").unwrap();
        std::fs::write(dir.path().join("b.txt"), "   ").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "ignored").unwrap();

        let mut config = parse_config("[store]\npath = \"unused.sqlite\"\n[ingest]\nextensions = [\"txt\"]\n").unwrap();
        config.ingest.concurrency = 2;
        let app = App::with_clients(
            config,
            Arc::new(LengthEmbedder),
            Arc::new(FixedGenerator),
            Arc::new(InMemoryStore::default()),
        );
        app.ingestor.ensure_schema().await.unwrap();

        let (status, json) = call(
            Arc::new(app),
            post_json(
                "/embedding/process-directory",
                serde_json::json!({"directoryPath": dir.path()}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let outcomes = json.as_array().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0]["filename"], "a.txt");
        assert_eq!(outcomes[0]["result"]["chunks"], 1);
        assert_eq!(outcomes[1]["filename"], "b.txt");
        assert_eq!(outcomes[1]["error"]["kind"], "no_content");
    }

    #[tokio::test]
    async fn test_reset_recreates_schema() {
        let app = test_app(Arc::new(LengthEmbedder)).await;
        app.ingestor
            .ingest_text("a.txt", "a", "Some clause.")
            .await
            .unwrap();

        let request = Request::builder()
            .method("DELETE")
            .uri("/embedding/reset")
            .body(Body::empty())
            .unwrap();
        let (status, json) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "LegalDocument schema and all data deleted.");

        // Collection exists again but is empty.
        let (status, json) = call(app, post_json("/query", serde_json::json!({"query": "clause"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["sources"].as_array().unwrap().len(), 0);
    }
}
