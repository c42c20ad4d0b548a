//! HTTP surface for vidpress.
//!
//! Five endpoints drive the whole service: upload a video, start a
//! compression run against a target size, poll status, download the result,
//! and clean a job up. Errors are reported as `{"error": ...}` JSON with a
//! meaningful status code.

use crate::config::Config;
use crate::jobs::{JobStatus, StatusReport};
use crate::orchestrator::{derive_max_concurrent_jobs, Orchestrator, OrchestratorError};
use crate::probe::probe_media;
use crate::registry::JobRegistry;
use crate::TwoPassEncoder;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Upload body limit: 10 GiB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024 * 1024;

/// Container extensions accepted for upload.
const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Errors that can occur when running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address: {0}")]
    InvalidBindAddr(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub upload_dir: PathBuf,
    pub ffprobe_bin: String,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        orchestrator: Arc<Orchestrator>,
        upload_dir: PathBuf,
        ffprobe_bin: String,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            upload_dir,
            ffprobe_bin,
        }
    }

    /// Wire up the registry, encoder, and orchestrator from configuration.
    pub fn from_config(cfg: &Config) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let encoder = TwoPassEncoder::new(
            cfg.encoding.ffmpeg_bin.clone(),
            cfg.encoding.ffprobe_bin.clone(),
            cfg.encoding.audio_bitrate_bps,
        );
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&registry),
            encoder,
            cfg.storage.output_dir.clone(),
            derive_max_concurrent_jobs(cfg.encoding.max_concurrent_jobs),
        ));
        Self::new(
            registry,
            orchestrator,
            cfg.storage.upload_dir.clone(),
            cfg.encoding.ffprobe_bin.clone(),
        )
    }
}

/// JSON error response with an HTTP status.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match &err {
            OrchestratorError::Registry(_) => ApiError::not_found(err.to_string()),
            OrchestratorError::AlreadyCompressing => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            OrchestratorError::InvalidTargetSize => ApiError::bad_request(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadResponse {
    job_id: Uuid,
    original_size: u64,
    duration: f64,
    filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompressRequest {
    job_id: Uuid,
    target_size: i64,
}

/// Strip any path components and reduce the name to a safe character set.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['_', '.']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn has_allowed_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// POST /upload: save the `file` multipart field, probe it, create a job.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = sanitize_filename(field.file_name().unwrap_or(""));
        if !has_allowed_extension(&filename) {
            return Err(ApiError::bad_request("file type not allowed"));
        }

        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| ApiError::internal(format!("could not create upload dir: {}", e)))?;
        let input_path = state
            .upload_dir
            .join(format!("{}_{}", Uuid::new_v4(), filename));

        let mut file = tokio::fs::File::create(&input_path)
            .await
            .map_err(|e| ApiError::internal(format!("could not create upload file: {}", e)))?;
        let mut size: u64 = 0;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&input_path).await;
                    return Err(ApiError::bad_request(format!("upload interrupted: {}", e)));
                }
            };
            size += chunk.len() as u64;
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&input_path).await;
                return Err(ApiError::internal(format!("could not write upload: {}", e)));
            }
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal(format!("could not write upload: {}", e)))?;
        drop(file);

        let info = match probe_media(&state.ffprobe_bin, &input_path).await {
            Ok(info) => info,
            Err(err) => {
                let _ = tokio::fs::remove_file(&input_path).await;
                return Err(ApiError::bad_request(format!(
                    "could not read video metadata: {}",
                    err
                )));
            }
        };

        let job_id = state
            .registry
            .create(input_path, filename.clone(), size, info.duration_secs);
        tracing::info!(job = %job_id, filename = %filename, size, "upload accepted");

        return Ok(Json(UploadResponse {
            job_id,
            original_size: size,
            duration: info.duration_secs,
            filename,
        }));
    }

    Err(ApiError::bad_request("missing file field"))
}

/// POST /compress: start a compression run for an uploaded job.
async fn compress(
    State(state): State<AppState>,
    Json(req): Json<CompressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.target_size <= 0 {
        return Err(ApiError::bad_request("target size must be positive"));
    }
    state
        .orchestrator
        .start_compression(req.job_id, req.target_size as u64)?;
    Ok(Json(json!({ "status": "started" })))
}

/// GET /status/:id: the polling surface; advances the job's log cursor.
async fn status(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<StatusReport>, ApiError> {
    state
        .registry
        .poll_status(id)
        .map(Json)
        .map_err(|e| ApiError::not_found(e.to_string()))
}

/// GET /download/:id: stream the compressed output as an attachment.
async fn download(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Response, ApiError> {
    let job = state
        .registry
        .get(id)
        .map_err(|e| ApiError::not_found(e.to_string()))?;

    if job.status != JobStatus::Completed {
        return Err(ApiError::bad_request("job is not completed"));
    }
    let output_path = job
        .output_path
        .ok_or_else(|| ApiError::not_found("output file not found"))?;
    let file = tokio::fs::File::open(&output_path)
        .await
        .map_err(|_| ApiError::not_found("output file not found"))?;

    let filename = job
        .output_filename
        .unwrap_or_else(|| format!("compressed_{}", job.original_filename));
    let body = axum::body::Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, body).into_response())
}

/// POST /cleanup/:id: drop the job record and its files.
async fn cleanup(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.orchestrator.cleanup(id)?;
    tracing::info!(job = %id, "job cleaned up");
    Ok(Json(json!({ "status": "cleaned" })))
}

/// Creates the axum Router with all service endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/compress", post(compress))
        .route("/status/:id", get(status))
        .route("/download/:id", get(download))
        .route("/cleanup/:id", post(cleanup))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Run the HTTP server on the configured bind address.
///
/// Creates the upload and output directories if missing, then serves until
/// the process is stopped.
pub async fn run_server(cfg: &Config) -> Result<(), ServerError> {
    tokio::fs::create_dir_all(&cfg.storage.upload_dir).await?;
    tokio::fs::create_dir_all(&cfg.storage.output_dir).await?;

    let state = AppState::from_config(cfg);
    let app = create_router(state);

    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .map_err(|_| ServerError::InvalidBindAddr(cfg.server.bind_addr.clone()))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "vidpress listening");
    axum::serve(listener, app).await?;

    Ok(())
}
