//! Shared data models for the transcode relay.
//!
//! This crate provides:
//! - The persisted [`JobRecord`] and its status lifecycle
//! - Wire types for the caller-facing and provider-facing HTTP surfaces
//! - Normalization of the provider's loosely shaped output payloads

pub mod api;
pub mod job;
pub mod output;

pub use api::{
    describe_provider_error, JobStatusView, SubmitJobRequest, SubmitJobResponse, WebhookAck,
    WebhookDisposition, WebhookPayload,
};
pub use job::{
    is_path_safe_job_id, is_valid_job_id, is_valid_output_format, JobRecord, JobStatus, JobUpdate,
    DEFAULT_OUTPUT_FORMAT,
};
pub use output::{OutputLocation, ProviderOutput, ProviderStatus};
