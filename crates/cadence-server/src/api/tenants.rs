use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use cadence_worker::{EnqueueReceipt, JobStatusView};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, map_queue_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct EnqueueItem {
    tenant_id: String,
    #[serde(flatten)]
    receipt: EnqueueReceipt,
}

/// Look up the tenant, turning a missing row into a `not_found` error.
async fn require_tenant(
    state: &AppState,
    req_id: &RequestId,
    tenant_id: &str,
) -> Result<cadence_db::TenantRow, ApiError> {
    match cadence_db::get_tenant(&state.pool, tenant_id).await {
        Ok(row) => Ok(row),
        Err(cadence_db::DbError::NotFound) => Err(ApiError::new(
            req_id.0.clone(),
            "not_found",
            format!("tenant {tenant_id} not found"),
        )),
        Err(e) => Err(map_db_error(req_id.0.clone(), &e)),
    }
}

pub(super) async fn get_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> Result<Json<ApiResponse<JobStatusView>>, ApiError> {
    require_tenant(&state, &req_id, &tenant_id).await?;

    let data = state
        .queue
        .get_status(&tenant_id)
        .await
        .map_err(|e| map_queue_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Manually enqueue a job for one tenant.
///
/// Responds `202 Accepted` when a new job was queued and `200 OK` when the
/// tenant already had one in flight. The request never waits for the job.
pub(super) async fn enqueue(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<EnqueueItem>>), ApiError> {
    let tenant = require_tenant(&state, &req_id, &tenant_id).await?;
    if !tenant.is_active {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            format!("tenant {tenant_id} is inactive"),
        ));
    }

    let enqueued = state.queue.add_job(&tenant_id).await;
    let status = if enqueued.receipt.queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApiResponse {
            data: EnqueueItem {
                tenant_id,
                receipt: enqueued.receipt,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
