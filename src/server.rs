//! HTTP API server.
//!
//! Exposes the chat pipeline, document indexing and the image store as a
//! JSON API for the campus web and mobile clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/v1/chat` | Answer one chat turn |
//! | `POST` | `/api/v1/index` | Index raw text |
//! | `POST` | `/api/v1/index/file` | Index a base64 PDF or text file, saving PDF images |
//! | `GET`  | `/api/v1/index/stats` | Segment names and record counts |
//! | `DELETE` | `/api/v1/index/{namespace}` | Wipe a namespace |
//! | `POST` | `/api/v1/index/{namespace}/delete` | Delete records by id |
//! | `POST` | `/api/v1/images` | Upload a labelled image |
//! | `GET`  | `/api/v1/images/{category}` | List images of a category |
//! | `GET`  | `/api/v1/images/file/{category}/{filename}` | Raw image bytes |
//! | `DELETE` | `/api/v1/images/file/{category}/{filename}` | Delete an image |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `generation_failed` (500), `internal` (500).
//!
//! Indexing endpoints always answer with an `IndexReport`; a report with
//! `success: false` is not an HTTP error. Namespace and category path
//! parameters are sanitized the same way indexing sanitizes them.

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use campus_assistant_core::category::GENERAL_CATEGORY;
use campus_assistant_core::images::ImageStore;
use campus_assistant_core::indexer::IndexMetadata;
use campus_assistant_core::models::{
    sanitize_name, ChatRequest, ChatResponse, Image, IndexReport, IndexStats,
};

use crate::extract::{default_label_prefix, extract_text, DocumentKind};
use crate::services::Services;

/// Uploads arrive base64-encoded inside JSON.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

const DEFAULT_SOURCE: &str = "admin";

type AppState = Arc<Services>;

/// Build the router. Split from [`run_server`] so tests can serve it on any listener.
pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v1/chat", post(handle_chat))
        .route("/api/v1/index", post(handle_index_text))
        .route("/api/v1/index/file", post(handle_index_file))
        .route("/api/v1/index/stats", get(handle_index_stats))
        .route("/api/v1/index/{namespace}", delete(handle_wipe_namespace))
        .route("/api/v1/index/{namespace}/delete", post(handle_delete_ids))
        .route("/api/v1/images", post(handle_upload_image))
        .route("/api/v1/images/{category}", get(handle_list_images))
        .route(
            "/api/v1/images/file/{category}/{filename}",
            get(handle_get_image_file).delete(handle_delete_image),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

/// Serve the API on `[server].bind` until Ctrl-C.
pub async fn run_server(services: Arc<Services>) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let app = router(services.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "campus assistant listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    services.shutdown().await;
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

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(code = self.code, message = %self.message, "request failed");
        }
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<campus_assistant_core::Error> for AppError {
    fn from(err: campus_assistant_core::Error) -> Self {
        use campus_assistant_core::Error;
        match err {
            Error::InvalidInput(msg) => bad_request(msg),
            e if e.is_model_failure() => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "generation_failed",
                message: e.to_string(),
            },
            e => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: e.to_string(),
            },
        }
    }
}

fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>, AppError> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| bad_request(format!("{} is not valid base64: {}", field, e)))
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

// ============ POST /api/v1/chat ============

async fn handle_chat(
    State(services): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    Ok(Json(services.chat.answer(request).await?))
}

// ============ Indexing ============

#[derive(Deserialize)]
struct IndexTextRequest {
    text: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

async fn handle_index_text(
    State(services): State<AppState>,
    Json(req): Json<IndexTextRequest>,
) -> Json<IndexReport> {
    let metadata = IndexMetadata {
        category: req.category,
        source: req.source,
        extra: req.metadata,
    };
    let report = services
        .indexer
        .index_text(&req.text, metadata, req.namespace.as_deref())
        .await;
    Json(report)
}

#[derive(Deserialize)]
struct IndexFileRequest {
    filename: String,
    content_base64: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default = "default_extract_images")]
    extract_images: bool,
    #[serde(default)]
    image_label_prefix: Option<String>,
}

fn default_extract_images() -> bool {
    true
}

#[derive(Serialize)]
struct IndexFileResponse {
    #[serde(flatten)]
    report: IndexReport,
    images_saved: usize,
    image_urls: Vec<String>,
}

async fn handle_index_file(
    State(services): State<AppState>,
    Json(req): Json<IndexFileRequest>,
) -> Result<Json<IndexFileResponse>, AppError> {
    let bytes = decode_base64("content_base64", &req.content_base64)?;
    let (kind, text) =
        extract_text(&req.filename, &bytes).map_err(|e| bad_request(e.to_string()))?;

    let mut extra = BTreeMap::new();
    extra.insert("filename".to_string(), req.filename.clone());
    if kind == DocumentKind::Pdf {
        extra.insert("type".to_string(), kind.as_str().to_string());
    }
    let metadata = IndexMetadata {
        category: Some(req.category.unwrap_or_else(|| GENERAL_CATEGORY.to_string())),
        source: Some(req.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string())),
        extra,
    };
    let report = services.indexer.index_text(&text, metadata, None).await;

    let images = if kind == DocumentKind::Pdf && req.extract_images {
        let prefix = req
            .image_label_prefix
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_label_prefix(&req.filename));
        services
            .images
            .save_pdf_images(&bytes, &report.category, &prefix)
            .await
    } else {
        Vec::new()
    };

    Ok(Json(IndexFileResponse {
        report,
        images_saved: images.len(),
        image_urls: images.into_iter().map(|i| i.url).collect(),
    }))
}

async fn handle_index_stats(State(services): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    Ok(Json(services.indexer.stats().await?))
}

async fn handle_wipe_namespace(
    State(services): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let namespace = sanitize_name(&namespace);
    services.indexer.wipe(&namespace).await?;
    Ok(Json(serde_json::json!({ "success": true, "namespace": namespace })))
}

#[derive(Deserialize)]
struct DeleteIdsRequest {
    ids: Vec<String>,
}

async fn handle_delete_ids(
    State(services): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<DeleteIdsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let namespace = sanitize_name(&namespace);
    let deleted = req.ids.len();
    services.indexer.delete(&namespace, req.ids).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "namespace": namespace,
        "deleted": deleted,
    })))
}

// ============ Images ============

#[derive(Deserialize)]
struct UploadImageRequest {
    category: String,
    label: String,
    #[serde(default)]
    description: String,
    filename: String,
    content_base64: String,
}

async fn handle_upload_image(
    State(services): State<AppState>,
    Json(req): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<Image>), AppError> {
    let bytes = decode_base64("content_base64", &req.content_base64)?;
    let image = services
        .images
        .save(&bytes, &req.category, &req.label, &req.description)
        .await
        .map_err(|e| match e {
            campus_assistant_core::Error::InvalidInput(msg) => {
                bad_request(format!("{}: {}", req.filename, msg))
            }
            other => other.into(),
        })?;
    Ok((StatusCode::CREATED, Json(image)))
}

#[derive(Serialize)]
struct ImageListResponse {
    category: String,
    images: Vec<Image>,
}

async fn handle_list_images(
    State(services): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<ImageListResponse>, AppError> {
    let category = sanitize_name(&category);
    let images = services.images.list_by_category(&category).await?;
    Ok(Json(ImageListResponse { category, images }))
}

async fn handle_get_image_file(
    State(services): State<AppState>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let file = services
        .images
        .read(&category, &filename)
        .await?
        .ok_or_else(|| not_found(format!("image not found: {}/{}", category, filename)))?;
    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes).into_response())
}

async fn handle_delete_image(
    State(services): State<AppState>,
    Path((category, filename)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !services.images.delete(&category, &filename).await? {
        return Err(not_found(format!("image not found: {}/{}", category, filename)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
