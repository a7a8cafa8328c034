//! Provider request/response types.

use relay_models::{describe_provider_error, ProviderOutput, ProviderStatus};
use serde::{Deserialize, Serialize};

/// Webhook event type registered with every submission.
pub const WEBHOOK_EVENT: &str = "job_start";

/// A job to hand to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitJob {
    pub source_url: String,
    pub output_format: String,
    /// Where the provider should push status changes
    pub callback_url: String,
}

/// Body of the submission request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitPayload<'a> {
    pub function: &'a str,
    pub inputs: SubmitInputs<'a>,
    pub webhooks: Vec<WebhookRegistration<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitInputs<'a> {
    pub source_url: &'a str,
    pub output_format: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WebhookRegistration<'a> {
    #[serde(rename = "type")]
    pub event: &'a str,
    pub url: &'a str,
}

impl<'a> SubmitPayload<'a> {
    pub fn new(function: &'a str, job: &'a SubmitJob) -> Self {
        Self {
            function,
            inputs: SubmitInputs {
                source_url: &job.source_url,
                output_format: &job.output_format,
            },
            webhooks: vec![WebhookRegistration {
                event: WEBHOOK_EVENT,
                url: &job.callback_url,
            }],
        }
    }
}

/// Response of the submission request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Raw status response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
    #[serde(default, alias = "outputs")]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Normalized status of a provider job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderJobStatus {
    pub status: ProviderStatus,
    /// Status string exactly as the provider sent it
    pub raw_status: String,
    pub output: Option<ProviderOutput>,
    pub error: Option<String>,
}

impl From<StatusResponse> for ProviderJobStatus {
    fn from(response: StatusResponse) -> Self {
        Self {
            status: ProviderStatus::parse(&response.status),
            raw_status: response.status,
            output: response.output.map(ProviderOutput::from_value),
            error: response.error.as_ref().and_then(describe_provider_error),
        }
    }
}
