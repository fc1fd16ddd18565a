//! Render job handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use vcut_models::{Job, JobId, JobStatus, RenderRequest};
use vcut_queue::QueueError;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response for an accepted render request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenderResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Status poll response. Absent values serialize as `null`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl From<Job> for RenderStatusResponse {
    fn from(job: Job) -> Self {
        let download_url = match job.status {
            JobStatus::Completed => Some(download_path(&job.id)),
            _ => None,
        };
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            download_url,
            error: job.error,
        }
    }
}

/// Relative URL of a job's artifact.
pub fn download_path(job_id: &JobId) -> String {
    format!("/api/render/{}/download", job_id)
}

/// Accept a render request and queue it.
pub async fn create_render(
    State(state): State<AppState>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateRenderResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        metrics::record_job_rejected("malformed");
        ApiError::bad_request(rejection.body_text())
    })?;

    let job_id = state.queue.submit(request).await.map_err(|e| {
        let reason = match &e {
            QueueError::Validation(_) => "invalid",
            QueueError::QueueFull { .. } => "queue_full",
            _ => "unavailable",
        };
        metrics::record_job_rejected(reason);
        if e.is_client_error() {
            info!(reason, error = %e, "Render request rejected");
        } else {
            warn!(reason, error = %e, "Render request not accepted");
        }
        ApiError::from(e)
    })?;
    metrics::record_job_submitted(state.queue.pending());

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateRenderResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// Poll a job.
pub async fn get_render_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<RenderStatusResponse>> {
    let job = state.queue.status(&JobId::from_string(job_id)).await?;
    Ok(Json(job.into()))
}

/// Stream a finished artifact as an attachment.
pub async fn download_render(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = JobId::from_string(job_id);
    let path = state.queue.artifact(&job_id).await?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(job_id = %job_id, path = %path.display(), "Artifact missing from disk");
            return Err(ApiError::Gone(format!("artifact for job {} was removed", job_id)));
        }
        Err(e) => return Err(ApiError::internal(format!("cannot open artifact: {}", e))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("cannot stat artifact: {}", e)))?
        .len();

    info!(job_id = %job_id, size_bytes = size, "Serving artifact");

    let disposition = format!("attachment; filename=\"render-{}.mp4\"", job_id);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::internal(format!("invalid filename header: {}", e)))?;

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
