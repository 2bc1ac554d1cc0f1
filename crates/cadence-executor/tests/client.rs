//! Integration tests for `HttpWorkExecutor` using wiremock HTTP mocks.

use cadence_executor::{ExecutorError, ExecutorSettings, HttpWorkExecutor};
use cadence_worker::{WorkError, WorkExecutor};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_executor(base_url: &str, max_retries: u32) -> HttpWorkExecutor {
    HttpWorkExecutor::new(&ExecutorSettings {
        endpoint: format!("{base_url}/generate"),
        timeout_secs: 5,
        max_retries,
        backoff_base_ms: 0,
        user_agent: "cadence-test/0.1".to_string(),
    })
    .expect("client construction should not fail")
}

#[tokio::test]
async fn generate_posts_tenant_and_returns_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(header("user-agent", "cadence-test/0.1"))
        .and(body_json(serde_json::json!({ "tenant_id": "shop-a" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "summary": "1204 products exported" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 2);
    let output = executor.generate("shop-a").await.expect("should succeed");

    assert_eq!(output.summary.as_deref(), Some("1204 products exported"));
}

#[tokio::test]
async fn empty_success_body_has_no_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 2);
    let output = executor.generate("shop-a").await.expect("should succeed");

    assert!(output.summary.is_none());
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "summary": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 2);
    let output = executor.generate("shop-a").await.expect("should recover");

    assert_eq!(output.summary.as_deref(), Some("ok"));
}

#[tokio::test]
async fn throttling_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 2);
    let err = executor.generate("shop-a").await.expect_err("should fail");

    match err {
        ExecutorError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown tenant"))
        .expect(1)
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 3);
    let err = executor.generate("ghost").await.expect_err("should fail");

    assert!(matches!(err, ExecutorError::Status { status: 422, .. }));
}

#[tokio::test]
async fn work_executor_maps_failure_to_work_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let executor = test_executor(&server.uri(), 0);
    let err = executor.execute("shop-a").await.expect_err("should fail");

    assert_eq!(
        err,
        WorkError::Failed("generator returned HTTP 500: boom".to_string())
    );
}
