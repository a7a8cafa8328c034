//! Wire types for the caller-facing and provider-facing endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::job::{JobRecord, JobStatus};

/// Body of `POST /api/jobs`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitJobRequest {
    /// Source media URL to transcode
    #[serde(default)]
    #[validate(length(min = 1, max = 2048, message = "url is required"))]
    pub url: String,
    /// Requested output format (defaults to mp3)
    #[serde(default)]
    #[validate(length(max = 10, message = "output_format must be at most 10 characters"))]
    pub output_format: Option<String>,
}

/// Response of `POST /api/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: String,
}

/// Response of `GET /api/jobs/status`.
///
/// Always well-formed: `file_url` is null until finalized and `error` is
/// null unless the job ended in `error` or `job_not_found`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub status: JobStatus,
    pub file_url: Option<String>,
    pub error: Option<String>,
}

impl JobStatusView {
    /// View for a job the provider no longer tracks and we never stored.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: JobStatus::JobNotFound,
            file_url: None,
            error: Some(detail.into()),
        }
    }

    /// View for a job whose finalization is currently in flight elsewhere.
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            file_url: None,
            error: None,
        }
    }
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        let file_url = match record.status {
            JobStatus::Finished => record.durable_file_url.clone(),
            _ => None,
        };
        let error = match record.status {
            JobStatus::Error | JobStatus::JobNotFound => record.error.clone(),
            _ => None,
        };
        Self {
            status: record.status,
            file_url,
            error,
        }
    }
}

/// Body pushed by the provider to `POST /api/webhooks/provider`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(alias = "jobId", alias = "id")]
    pub job_id: String,
    pub status: String,
    /// Output location(s), in any of the shapes the provider uses
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Failure detail, when the provider includes one
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Acknowledgement returned to the provider for every webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: WebhookDisposition,
}

/// Whether a webhook delivery changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDisposition {
    Received,
    Ignored,
}

impl WebhookDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookDisposition::Received => "received",
            WebhookDisposition::Ignored => "ignored",
        }
    }
}

/// Render a provider-supplied error value (string or structured) as text.
pub fn describe_provider_error(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobUpdate;
    use serde_json::json;

    #[test]
    fn test_status_view_shape() {
        let record = JobRecord::queued("J1", "https://example.com/a.mp4", "mp3");
        let value = serde_json::to_value(JobStatusView::from(&record)).unwrap();
        assert_eq!(
            value,
            json!({"status": "queued", "fileUrl": null, "error": null})
        );
    }

    #[test]
    fn test_status_view_finished() {
        let mut record = JobRecord::queued("J1", "https://example.com/a.mp4", "mp3");
        record.apply(&JobUpdate::Finished {
            durable_file_url: "https://cdn.example/transcode-J1.mp3".into(),
        });
        let view = JobStatusView::from(&record);
        assert_eq!(view.status, JobStatus::Finished);
        assert_eq!(
            view.file_url.as_deref(),
            Some("https://cdn.example/transcode-J1.mp3")
        );
        assert!(view.error.is_none());
    }

    #[test]
    fn test_submit_request_validation() {
        let request: SubmitJobRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.validate().is_err());

        let request: SubmitJobRequest =
            serde_json::from_value(json!({"url": "https://example.com/a.mp4"})).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.output_format.is_none());

        let request: SubmitJobRequest =
            serde_json::from_value(json!({"url": "https://example.com/a.mp4", "output_format": ""}))
                .unwrap();
        assert!(request.validate().is_ok());

        let request: SubmitJobRequest = serde_json::from_value(
            json!({"url": "https://example.com/a.mp4", "output_format": "abcdefghijk"}),
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_webhook_payload_accepts_aliases() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "id": "J1",
            "status": "finished",
            "data": ["https://provider.example/out.mp3"]
        }))
        .unwrap();
        assert_eq!(payload.job_id, "J1");
        assert!(payload.data.is_some());
        assert!(payload.error.is_none());
    }

    #[test]
    fn test_webhook_ack_serializes() {
        let ack = WebhookAck {
            status: WebhookDisposition::Ignored,
        };
        assert_eq!(serde_json::to_value(ack).unwrap(), json!({"status": "ignored"}));
    }

    #[test]
    fn test_describe_provider_error() {
        assert_eq!(describe_provider_error(&json!(null)), None);
        assert_eq!(describe_provider_error(&json!("boom")).as_deref(), Some("boom"));
        assert_eq!(
            describe_provider_error(&json!({"message": "bad codec"})).as_deref(),
            Some("bad codec")
        );
    }
}
