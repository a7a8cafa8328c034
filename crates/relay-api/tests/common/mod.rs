//! Shared fixtures: the real router wired to a wiremock-backed provider,
//! artifact host and upload target.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_api::{create_router, ApiConfig, AppState, RelayConfig};
use relay_provider::{ProviderClient, ProviderConfig};
use relay_storage::{ObjectStore, StorageResult};
use relay_store::MemoryJobStore;

pub const CDN: &str = "https://cdn.example.com";

/// Presigns uploads onto the mock server and serves objects from [`CDN`].
pub struct MockObjectStore {
    base: String,
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn presign_upload(&self, object_name: &str, _content_type: &str) -> StorageResult<String> {
        Ok(format!("{}/upload/{}", self.base, object_name))
    }

    fn public_url(&self, object_name: &str) -> String {
        format!("{}/{}", CDN, object_name)
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryJobStore>,
    pub app: Router,
}

pub async fn harness() -> Harness {
    harness_with_token(None).await
}

pub async fn harness_with_token(token: Option<&str>) -> Harness {
    let server = MockServer::start().await;

    let provider = ProviderClient::new(ProviderConfig {
        base_url: format!("{}/provider", server.uri()),
        api_key: "test-key".to_string(),
        function: "media/transcode".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    let mut relay = RelayConfig::new(Url::parse("https://relay.example.com").unwrap());
    relay.submit_backoff = Duration::from_millis(5);
    relay.webhook_token = token.map(str::to_string);

    let store = Arc::new(MemoryJobStore::new(Duration::from_secs(600), 1000));
    let state = AppState::from_parts(
        ApiConfig::default(),
        relay,
        store.clone(),
        Arc::new(provider),
        Arc::new(MockObjectStore { base: server.uri() }),
    )
    .unwrap();

    Harness {
        app: create_router(state, None),
        server,
        store,
    }
}

impl Harness {
    pub fn artifact_url(&self, name: &str) -> String {
        format!("{}/artifacts/{}", self.server.uri(), name)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn submit(&self, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/jobs")
                .header("Authorization", "Bearer caller-token")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn poll(&self, job_id: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(format!("/api/jobs/status?jobId={}", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn webhook(&self, body: Value) -> (StatusCode, Value) {
        self.webhook_raw("/api/webhooks/provider", body.to_string())
            .await
    }

    pub async fn webhook_raw(&self, uri: &str, body: String) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Provider accepts every submission with `id`.
    pub async fn mount_submit(&self, id: &str) {
        Mock::given(method("POST"))
            .and(path("/provider/push"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
            .mount(&self.server)
            .await;
    }

    /// Provider status endpoint for `id`, expected to be hit `expect` times.
    pub async fn mount_status(&self, id: &str, status: u16, body: Value, expect: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/provider/jobs/{}", id)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Ephemeral artifact hosted by the provider.
    pub async fn mount_artifact(&self, name: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/artifacts/{}", name)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"transcoded-bytes".to_vec())
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Durable upload target, expected to receive exactly `expect` PUTs.
    pub async fn mount_upload(&self, object_name: &str, expect: u64) {
        Mock::given(method("PUT"))
            .and(path(format!("/upload/{}", object_name)))
            .respond_with(ResponseTemplate::new(200))
            .expect(expect)
            .mount(&self.server)
            .await;
    }
}
