//! Result finalization: relocate a provider artifact into durable storage.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use relay_storage::{content_type_for, object_name, ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("Invalid output location: {0}")]
    InvalidOutputLocation(String),

    #[error("Failed to fetch artifact: {detail}")]
    UpstreamFetchFailed { status: Option<u16>, detail: String },

    #[error("Artifact is {size} bytes, limit is {limit}")]
    ArtifactTooLarge { size: u64, limit: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to upload artifact: {0}")]
    StorageUploadFailed(String),
}

impl FinalizeError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FinalizeError::InvalidOutputLocation(_) => "invalid_output_location",
            FinalizeError::UpstreamFetchFailed { .. } => "upstream_fetch_failed",
            FinalizeError::ArtifactTooLarge { .. } => "artifact_too_large",
            FinalizeError::Storage(_) => "storage",
            FinalizeError::StorageUploadFailed(_) => "storage_upload_failed",
        }
    }
}

/// Moves artifacts from the provider's ephemeral hosting into the object store.
///
/// Performs no job store mutation. Object names are derived only from the
/// job id and format, so repeating a finalization overwrites the same object.
pub struct Finalizer {
    http: Client,
    objects: Arc<dyn ObjectStore>,
    object_prefix: String,
    max_artifact_bytes: u64,
}

impl Finalizer {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        object_prefix: impl Into<String>,
        timeout: Duration,
        max_artifact_bytes: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            objects,
            object_prefix: object_prefix.into(),
            max_artifact_bytes,
        })
    }

    /// Fetch `ephemeral_url` and store it durably; returns the public URL.
    pub async fn finalize(
        &self,
        job_id: &str,
        ephemeral_url: &str,
        output_format: &str,
    ) -> Result<String, FinalizeError> {
        let source = Url::parse(ephemeral_url)
            .map_err(|e| FinalizeError::InvalidOutputLocation(format!("{}: {}", ephemeral_url, e)))?;
        if !matches!(source.scheme(), "http" | "https") {
            return Err(FinalizeError::InvalidOutputLocation(format!(
                "unsupported scheme {:?}",
                source.scheme()
            )));
        }

        let name = object_name(&self.object_prefix, job_id, output_format)?;
        let content_type = content_type_for(output_format);

        debug!(job_id = %job_id, source = %source, "Fetching artifact");
        let bytes = self.fetch(source).await?;
        let size = bytes.len();

        let upload_url = self.objects.presign_upload(&name, content_type).await?;
        let response = self
            .http
            .put(&upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| FinalizeError::StorageUploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinalizeError::StorageUploadFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let durable_url = self.objects.public_url(&name);
        info!(job_id = %job_id, object = %name, bytes = size, "Artifact relocated");
        Ok(durable_url)
    }

    async fn fetch(&self, source: Url) -> Result<Bytes, FinalizeError> {
        let response = self
            .http
            .get(source)
            .send()
            .await
            .map_err(|e| FinalizeError::UpstreamFetchFailed {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FinalizeError::UpstreamFetchFailed {
                status: Some(status.as_u16()),
                detail: format!("HTTP {}", status.as_u16()),
            });
        }

        if let Some(size) = response.content_length() {
            if size > self.max_artifact_bytes {
                return Err(FinalizeError::ArtifactTooLarge {
                    size,
                    limit: self.max_artifact_bytes,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FinalizeError::UpstreamFetchFailed {
                status: Some(status.as_u16()),
                detail: e.to_string(),
            })?;

        if bytes.len() as u64 > self.max_artifact_bytes {
            return Err(FinalizeError::ArtifactTooLarge {
                size: bytes.len() as u64,
                limit: self.max_artifact_bytes,
            });
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use relay_storage::StorageResult;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct UploadTarget {
        base: String,
    }

    #[async_trait]
    impl ObjectStore for UploadTarget {
        async fn presign_upload(&self, object_name: &str, _content_type: &str) -> StorageResult<String> {
            Ok(format!("{}/upload/{}", self.base, object_name))
        }

        fn public_url(&self, object_name: &str) -> String {
            format!("https://cdn.example.com/{}", object_name)
        }

        async fn check_connectivity(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    fn finalizer(server: &MockServer, limit: u64) -> Finalizer {
        Finalizer::new(
            Arc::new(UploadTarget { base: server.uri() }),
            "transcode",
            Duration::from_secs(5),
            limit,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_finalize_relocates_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/transcode-J1.mp3"))
            .and(header("content-type", "audio/mpeg"))
            .and(body_bytes(b"ID3audio".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = finalizer(&server, 1024)
            .finalize("J1", &format!("{}/out.mp3", server.uri()), "mp3")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/transcode-J1.mp3");
    }

    #[tokio::test]
    async fn test_finalize_rejects_non_http_location() {
        let server = MockServer::start().await;
        let err = finalizer(&server, 1024)
            .finalize("J1", "ftp://provider.example/out.mp3", "mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::InvalidOutputLocation(_)));

        let err = finalizer(&server, 1024)
            .finalize("J1", "not a url", "mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::InvalidOutputLocation(_)));
    }

    #[tokio::test]
    async fn test_finalize_reports_fetch_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = finalizer(&server, 1024)
            .finalize("J1", &format!("{}/gone.mp3", server.uri()), "mp3")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FinalizeError::UpstreamFetchFailed {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_finalize_reports_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/transcode-J1.mp3"))
            .respond_with(ResponseTemplate::new(403).set_body_string("SignatureDoesNotMatch"))
            .mount(&server)
            .await;

        let err = finalizer(&server, 1024)
            .finalize("J1", &format!("{}/out.mp3", server.uri()), "mp3")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage_upload_failed");
        assert!(err.to_string().contains("SignatureDoesNotMatch"));
    }

    #[tokio::test]
    async fn test_finalize_enforces_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let err = finalizer(&server, 16)
            .finalize("J1", &format!("{}/big.mp3", server.uri()), "mp3")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FinalizeError::ArtifactTooLarge { size: 64, limit: 16 }
        ));
    }

    #[tokio::test]
    async fn test_finalize_rejects_untrackable_job_id_before_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = finalizer(&server, 1024)
            .finalize("bad id", &format!("{}/out.mp3", server.uri()), "mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::Storage(StorageError::InvalidKey(_))));
    }
}
