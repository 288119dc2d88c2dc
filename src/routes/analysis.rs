use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiResult, ValidationError};
use crate::models::analysis::{
    DeleteResponse, HistoryQuery, HistoryResponse, JobView, SubmitResponse,
};
use crate::services::orchestrator::{Upload, MAX_ARTIFACTS, MAX_ARTIFACT_BYTES};

/// Whole-request cap for uploads: every image at its limit plus form overhead.
pub const MAX_REQUEST_BYTES: usize = MAX_ARTIFACTS * MAX_ARTIFACT_BYTES + 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    pub user_id: Option<String>,
}

fn normalize_owner(owner: Option<String>) -> Option<String> {
    owner
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ValidationError {
    ValidationError::Malformed(err.body_text())
}

/// GET /: service banner.
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "message": "Resale Price Checker API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/analyze: upload 1-5 images and start an analysis job.
pub async fn submit_analysis(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let mut owner_id = normalize_owner(params.user_id);
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("images") | Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(malformed)?;
                uploads.push(Upload {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            Some("user_id") => {
                let text = field.text().await.map_err(malformed)?;
                if owner_id.is_none() {
                    owner_id = normalize_owner(Some(text));
                }
            }
            _ => {}
        }
    }

    let job = state.orchestrator.submit(owner_id, uploads).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id: job.id,
            status: "processing".to_string(),
            estimated_seconds: job.estimated_seconds,
        }),
    ))
}

/// GET /api/analysis/{job_id}: current state of a job.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobView>> {
    let job = state.orchestrator.get(job_id).await?;
    Ok(Json(JobView::from(&job)))
}

/// GET /api/history/{user_id}: an owner's jobs, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    query
        .validate()
        .map_err(|e| ValidationError::Query(e.to_string()))?;

    let jobs = state
        .orchestrator
        .registry()
        .list_by_owner(&user_id)
        .await?;
    Ok(Json(HistoryResponse::paginate(&jobs, query.page, query.limit)))
}

/// DELETE /api/analysis/{job_id}: remove a job and its images.
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    state.orchestrator.delete(job_id).await?;
    Ok(Json(DeleteResponse {
        job_id,
        deleted: true,
        message: "Analysis deleted successfully".to_string(),
    }))
}

/// POST /api/analysis/{job_id}/rerun: operator re-trigger.
pub async fn rerun_analysis(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobView>> {
    let job = state.orchestrator.rerun(job_id).await?;
    Ok(Json(JobView::from(&job)))
}
