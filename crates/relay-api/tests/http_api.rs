//! HTTP surface: auth gate, validation, webhook acknowledgement, health checks.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{harness, harness_with_token};
use relay_models::JobStatus;
use relay_store::JobStore;

#[tokio::test]
async fn test_health_endpoints() {
    let h = harness().await;

    for uri in ["/health", "/healthz"] {
        let (status, body) = h
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    let (status, body) = h
        .send(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["store"]["status"], "ok");
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let h = harness().await;
    let (status, _) = h
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_requires_bearer_token() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let (status, body) = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/jobs")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"url": "https://example.com/a.mp4"}).to_string()))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_submit_validates_before_calling_provider() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let (status, _) = h.submit(json!({"url": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.submit(json!({"output_format": "mp3"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .submit(json!({"url": "https://example.com/a.mp4", "output_format": "../mp3"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/jobs")
                .header("Authorization", "Bearer caller-token")
                .header("Content-Type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid request body"));
}

#[tokio::test]
async fn test_submit_registers_callback_and_defaults_format() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .and(body_partial_json(json!({
            "inputs": {"sourceUrl": "https://example.com/a.mp4", "outputFormat": "mp3"},
            "webhooks": [{
                "type": "job_start",
                "url": "https://relay.example.com/api/webhooks/provider"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = h.submit(json!({"url": " https://example.com/a.mp4 "})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], "J1");
}

#[tokio::test]
async fn test_poll_requires_job_id() {
    let h = harness().await;

    let (status, body) = h
        .send(
            Request::builder()
                .uri("/api/jobs/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "jobId is required");

    let (status, _) = h.poll("").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.poll("bad%20id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_always_acknowledges() {
    let h = harness().await;

    let (status, body) = h
        .webhook_raw("/api/webhooks/provider", "{not json".to_string())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));

    let (status, body) = h
        .webhook(json!({"job_id": "never-submitted", "status": "finished", "data": []}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));

    let (status, body) = h.webhook(json!({"status": "finished"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));
}

#[tokio::test]
async fn test_oversized_webhook_is_acknowledged_not_rejected() {
    let h = harness().await;
    h.mount_submit("J1").await;
    h.submit(json!({"url": "https://example.com/a.mp4"})).await;

    let padding = "x".repeat(2 * 1024 * 1024);
    let delivery = json!({
        "job_id": "J1",
        "status": "error",
        "error": "boom",
        "logs": padding
    })
    .to_string();

    let (status, body) = h.webhook_raw("/api/webhooks/provider", delivery).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));
    assert_eq!(
        h.store.get("J1").await.unwrap().unwrap().status,
        JobStatus::Queued
    );
}

#[tokio::test]
async fn test_oversized_submission_is_rejected() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(0)
        .mount(&h.server)
        .await;

    let url = format!("https://example.com/{}", "a".repeat(2 * 1024 * 1024));
    let payload = json!({ "url": url }).to_string();
    let (status, _) = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/jobs")
                .header("Authorization", "Bearer caller-token")
                .header("Content-Type", "application/json")
                .header("Content-Length", payload.len())
                .body(Body::from(payload))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_submit_treats_empty_output_format_as_default() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .and(body_partial_json(json!({"inputs": {"outputFormat": "mp3"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let (status, body) = h
        .submit(json!({"url": "https://example.com/a.mp4", "output_format": ""}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], "J1");
    assert_eq!(h.store.get("J1").await.unwrap().unwrap().output_format, "mp3");
}

#[tokio::test]
async fn test_webhook_accepts_job_id_aliases() {
    let h = harness().await;
    h.mount_submit("J1").await;
    h.submit(json!({"url": "https://example.com/a.mp4"})).await;

    let (_, body) = h
        .webhook(json!({"jobId": "J1", "status": "error", "error": "boom"}))
        .await;

    assert_eq!(body, json!({"status": "received"}));
    let record = h.store.get("J1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(record.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_intermediate_webhook_does_not_mutate() {
    let h = harness().await;
    h.mount_submit("J1").await;
    h.submit(json!({"url": "https://example.com/a.mp4"})).await;

    let (_, body) = h
        .webhook(json!({"job_id": "J1", "status": "processing"}))
        .await;

    assert_eq!(body, json!({"status": "ignored"}));
    let record = h.store.get("J1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_webhook_token_is_enforced() {
    let h = harness_with_token(Some("s3cret")).await;
    Mock::given(method("POST"))
        .and(path("/provider/push"))
        .and(body_partial_json(json!({
            "webhooks": [{
                "type": "job_start",
                "url": "https://relay.example.com/api/webhooks/provider?token=s3cret"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "J1"})))
        .expect(1)
        .mount(&h.server)
        .await;
    h.submit(json!({"url": "https://example.com/a.mp4"})).await;

    let delivery = json!({"job_id": "J1", "status": "error", "error": "boom"}).to_string();

    let (status, body) = h
        .webhook_raw("/api/webhooks/provider", delivery.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));

    let (_, body) = h
        .webhook_raw("/api/webhooks/provider?token=wrong", delivery.clone())
        .await;
    assert_eq!(body, json!({"status": "ignored"}));
    assert_eq!(
        h.store.get("J1").await.unwrap().unwrap().status,
        JobStatus::Queued
    );

    let (_, body) = h
        .webhook_raw("/api/webhooks/provider?token=s3cret", delivery)
        .await;
    assert_eq!(body, json!({"status": "received"}));
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let h = harness().await;
    let response = tower::ServiceExt::oneshot(
        h.app.clone(),
        Request::builder()
            .uri("/health")
            .header("X-Request-ID", "req-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "req-123");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_job_routes_are_rate_limited_per_ip() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/provider/jobs/J1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .mount(&h.server)
        .await;

    let mut limited = false;
    for _ in 0..30 {
        let response = tower::ServiceExt::oneshot(
            h.app.clone(),
            Request::builder()
                .uri("/api/jobs/status?jobId=J1")
                .header("X-Forwarded-For", "198.51.100.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited);

    // Provider pushes from the same address still go through
    let response = tower::ServiceExt::oneshot(
        h.app.clone(),
        Request::builder()
            .method("POST")
            .uri("/api/webhooks/provider")
            .header("X-Forwarded-For", "198.51.100.9")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
