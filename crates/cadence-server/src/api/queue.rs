use axum::{extract::State, Extension, Json};
use cadence_core::TierCadence;
use cadence_worker::QueueSnapshot;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

pub(super) async fn get_queue(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<QueueSnapshot>> {
    Json(ApiResponse {
        data: state.queue.snapshot().await,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn list_tiers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<TierCadence>>> {
    Json(ApiResponse {
        data: state.tiers.iter().cloned().collect(),
        meta: ResponseMeta::new(req_id.0),
    })
}
