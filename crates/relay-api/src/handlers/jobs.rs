//! Job submission and status polling handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use relay_models::{JobStatusView, SubmitJobRequest, SubmitJobResponse};

use crate::auth::BearerToken;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query parameters of the status endpoint.
#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    #[serde(rename = "jobId", alias = "job_id")]
    pub job_id: Option<String>,
}

/// Submit a transcoding job.
pub async fn submit_job(
    State(state): State<AppState>,
    _token: BearerToken,
    body: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitJobResponse>> {
    let Json(request) =
        body.map_err(|e| ApiError::invalid_request(format!("Invalid request body: {}", e)))?;

    let job_id = state.gateway.submit(request).await?;
    Ok(Json(SubmitJobResponse { job_id }))
}

/// Current status of a job, finalizing it if the provider reports completion.
///
/// A job the provider no longer knows is reported as `job_not_found` in the
/// body with HTTP 200; callers poll against that contract.
pub async fn get_job_status(
    State(state): State<AppState>,
    query: Result<Query<JobStatusQuery>, QueryRejection>,
) -> ApiResult<Json<JobStatusView>> {
    let Query(query) =
        query.map_err(|e| ApiError::invalid_request(format!("Invalid query: {}", e)))?;
    let job_id = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_request("jobId is required"))?;

    let view = state.poller.query(&job_id).await?;
    Ok(Json(view))
}
