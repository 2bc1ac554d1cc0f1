mod queue;
mod tenants;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use cadence_core::TierCadenceTable;
use cadence_worker::{QueueError, WorkQueue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: WorkQueue,
    pub tiers: Arc<TierCadenceTable>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &cadence_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_queue_error(request_id: String, error: &QueueError) -> ApiError {
    tracing::error!(error = %error, "job status lookup failed");
    ApiError::new(request_id, "internal_error", "job status lookup failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/tenants/{tenant_id}/status",
            get(tenants::get_status),
        )
        .route(
            "/api/v1/tenants/{tenant_id}/enqueue",
            post(tenants::enqueue),
        )
        .route("/api/v1/queue", get(queue::get_queue))
        .route("/api/v1/tiers", get(queue::list_tiers))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match cadence_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PgStatusStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use cadence_worker::{QueueSettings, WorkError, WorkExecutor, WorkOutput};
    use futures::future::BoxFuture;
    use tower::ServiceExt;

    struct NoopExecutor;

    impl WorkExecutor for NoopExecutor {
        fn execute<'a>(
            &'a self,
            _tenant_id: &'a str,
        ) -> BoxFuture<'a, Result<WorkOutput, WorkError>> {
            Box::pin(async { Ok(WorkOutput::default()) })
        }
    }

    /// App over a queue whose worker is never started, so enqueued jobs stay
    /// put and positions are deterministic.
    fn test_app(pool: PgPool, auth: AuthState) -> Router {
        let queue = WorkQueue::new(
            Arc::new(NoopExecutor),
            Arc::new(PgStatusStore::new(pool.clone())),
            QueueSettings::default(),
        );
        let state = AppState {
            pool,
            queue,
            tiers: Arc::new(TierCadenceTable::default()),
        };
        build_app(state, auth, default_rate_limit_state())
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).expect("json parse");
        (status, json)
    }

    async fn seed_tenant(pool: &PgPool, id: &str, tier: &str) {
        cadence_db::upsert_tenant(pool, id, tier)
            .await
            .expect("seed tenant");
    }

    #[test]
    fn api_error_codes_map_to_http_status() {
        let not_found = ApiError::new("req-1", "not_found", "missing").into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let conflict = ApiError::new("req-1", "conflict", "inactive").into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let internal = ApiError::new("req-1", "internal_error", "boom").into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_is_public_and_reports_database(pool: PgPool) {
        let auth = AuthState::from_config(&["secret".to_string()], false).expect("auth");
        let (status, json) = send(test_app(pool, auth), "GET", "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_require_bearer_token(pool: PgPool) {
        let auth = AuthState::from_config(&["secret".to_string()], false).expect("auth");
        let app = test_app(pool, auth);

        let (status, json) = send(app.clone(), "GET", "/api/v1/queue").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "unauthorized");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/queue")
                    .header("authorization", "Bearer secret")
                    .header("x-request-id", "req-abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").map(|v| v.as_bytes()),
            Some(&b"req-abc"[..])
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn enqueue_returns_202_then_200_for_duplicate(pool: PgPool) {
        seed_tenant(&pool, "shop-a", "growth").await;
        seed_tenant(&pool, "shop-b", "growth").await;
        let app = test_app(pool, AuthState::disabled());

        let (status, json) = send(app.clone(), "POST", "/api/v1/tenants/shop-a/enqueue").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["queued"], true);
        assert_eq!(json["data"]["position"], 1);

        let (status, json) = send(app.clone(), "POST", "/api/v1/tenants/shop-b/enqueue").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["position"], 2);
        assert_eq!(json["data"]["estimated_seconds"], 120);

        let (status, json) = send(app.clone(), "POST", "/api/v1/tenants/shop-a/enqueue").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["queued"], false);
        assert_eq!(json["data"]["position"], 1);

        let (status, json) = send(app, "GET", "/api/v1/queue").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["worker"]["is_processing"], false);
        assert_eq!(json["data"]["pending"].as_array().map(Vec::len), Some(2));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn enqueue_rejects_unknown_and_inactive_tenants(pool: PgPool) {
        seed_tenant(&pool, "dormant", "starter").await;
        sqlx::query("UPDATE tenants SET is_active = false WHERE id = 'dormant'")
            .execute(&pool)
            .await
            .expect("deactivate");
        let app = test_app(pool, AuthState::disabled());

        let (status, json) = send(app.clone(), "POST", "/api/v1/tenants/ghost/enqueue").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");

        let (status, _) = send(app, "POST", "/api/v1/tenants/dormant/enqueue").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn status_reports_queue_position_then_persisted_record(pool: PgPool) {
        seed_tenant(&pool, "shop-a", "growth").await;
        seed_tenant(&pool, "shop-b", "growth").await;
        cadence_db::upsert_job_status(
            &pool,
            &cadence_db::JobStatusRow {
                tenant_id: "shop-b".to_string(),
                in_progress: false,
                status: "completed".to_string(),
                message: "1204 products exported".to_string(),
                queued_at: Some(Utc::now()),
                started_at: Some(Utc::now()),
                completed_at: Some(Utc::now()),
                failed_at: None,
                last_error: None,
                result_summary: Some("1204 products exported".to_string()),
                updated_at: Utc::now(),
            },
        )
        .await
        .expect("seed status");
        let app = test_app(pool, AuthState::disabled());

        send(app.clone(), "POST", "/api/v1/tenants/shop-a/enqueue").await;

        let (status, json) = send(app.clone(), "GET", "/api/v1/tenants/shop-a/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "queued");
        assert_eq!(json["data"]["position"], 1);
        assert_eq!(json["data"]["queue_length"], 1);
        assert_eq!(json["data"]["message"], "Queued (position 1)");

        let (status, json) = send(app, "GET", "/api/v1/tenants/shop-b/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "completed");
        assert_eq!(json["data"]["in_progress"], false);
        assert_eq!(json["data"]["result_summary"], "1204 products exported");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn status_for_tenant_without_history_is_idle(pool: PgPool) {
        seed_tenant(&pool, "fresh", "starter").await;
        let app = test_app(pool, AuthState::disabled());

        let (status, json) = send(app, "GET", "/api/v1/tenants/fresh/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "idle");
        assert!(json["data"]["position"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn tiers_lists_cadence_table(pool: PgPool) {
        let app = test_app(pool, AuthState::disabled());

        let (status, json) = send(app, "GET", "/api/v1/tiers").await;
        assert_eq!(status, StatusCode::OK);
        let tiers = json["data"].as_array().expect("data array");
        assert_eq!(tiers.len(), 5);
        assert_eq!(tiers[0]["key"], "starter");
        assert_eq!(tiers[4]["key"], "enterprise");
        assert_eq!(tiers[4]["min_interval_hours"], 2.0);
    }
}
