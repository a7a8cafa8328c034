//! Job record and status lifecycle.
//!
//! A [`JobRecord`] is the only persisted entity. Its status only moves
//! forward (`queued -> processing -> finished | error`), with
//! `job_not_found` as an additional terminal sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output format used when the caller does not request one.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3";

/// Maximum accepted length of a provider-assigned job id.
const MAX_JOB_ID_LEN: usize = 256;

/// Maximum accepted length of an output format (file extension).
const MAX_OUTPUT_FORMAT_LEN: usize = 10;

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the provider, not yet started
    #[default]
    Queued,
    /// Provider reported the job as running
    Processing,
    /// Output relocated to durable storage
    Finished,
    /// Job failed, either upstream or during finalization
    Error,
    /// Provider no longer tracks the job; outcome unknowable
    JobNotFound,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
            JobStatus::JobNotFound => "job_not_found",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Error | JobStatus::JobNotFound
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Finished | JobStatus::Error | JobStatus::JobNotFound => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted job metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Provider-assigned job id
    pub id: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Input the caller asked to be processed. Absent only for records
    /// adopted from a provider status query after local state was lost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_source_url: Option<String>,
    /// Requested output encoding (file extension)
    pub output_format: String,
    /// Durable location of the finalized artifact
    #[serde(default)]
    pub durable_file_url: Option<String>,
    /// Failure detail for `error` / `job_not_found`
    #[serde(default)]
    pub error: Option<String>,
    /// Last raw status string reported by the provider
    #[serde(default)]
    pub provider_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single state change requested by one of the completion channels.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Intermediate progress reported by the provider.
    Progress {
        status: JobStatus,
        provider_status: Option<String>,
    },
    /// Finalization completed.
    Finished { durable_file_url: String },
    /// The job failed.
    Failed { error: String },
    /// The provider lost track of the job.
    NotFound { error: String },
}

impl JobUpdate {
    /// Status the record ends in if the update applies.
    pub fn target_status(&self) -> JobStatus {
        match self {
            JobUpdate::Progress { status, .. } => *status,
            JobUpdate::Finished { .. } => JobStatus::Finished,
            JobUpdate::Failed { .. } => JobStatus::Error,
            JobUpdate::NotFound { .. } => JobStatus::JobNotFound,
        }
    }
}

impl JobRecord {
    /// Create the initial record written right after a provider accepted a submission.
    pub fn queued(
        id: impl Into<String>,
        source_url: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            original_source_url: Some(source_url.into()),
            output_format: output_format.into(),
            durable_file_url: None,
            error: None,
            provider_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a record for a job the provider knows about but local state lost.
    pub fn adopted(id: impl Into<String>, output_format: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            original_source_url: None,
            output_format: output_format.into(),
            durable_file_url: None,
            error: None,
            provider_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an update in place.
    ///
    /// Returns `false` (leaving the record untouched) when the update would
    /// move a terminal record or regress the status.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        if !self.status.can_advance_to(update.target_status()) {
            return false;
        }

        match update {
            JobUpdate::Progress {
                status,
                provider_status,
            } => {
                if *status == self.status && *provider_status == self.provider_status {
                    return false;
                }
                self.status = *status;
                self.provider_status = provider_status.clone();
            }
            JobUpdate::Finished { durable_file_url } => {
                if self.durable_file_url.is_some() {
                    return false;
                }
                self.status = JobStatus::Finished;
                self.durable_file_url = Some(durable_file_url.clone());
                self.error = None;
            }
            JobUpdate::Failed { error } => {
                self.status = JobStatus::Error;
                self.error = Some(error.clone());
            }
            JobUpdate::NotFound { error } => {
                self.status = JobStatus::JobNotFound;
                self.error = Some(error.clone());
            }
        }

        self.updated_at = Utc::now();
        true
    }
}

/// Validate a provider job id.
///
/// Ids are opaque to us: anything non-empty without whitespace or control
/// characters, up to 256 chars. Call sites that embed an id in a path or
/// object name must escape it (see [`is_path_safe_job_id`]).
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_JOB_ID_LEN
        && !id.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Whether `id` can be embedded verbatim in object names (`[A-Za-z0-9_-]`).
pub fn is_path_safe_job_id(id: &str) -> bool {
    is_valid_job_id(id)
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate an output format (used as a file extension).
pub fn is_valid_output_format(format: &str) -> bool {
    !format.is_empty()
        && format.len() <= MAX_OUTPUT_FORMAT_LEN
        && format.chars().all(|c| c.is_ascii_alphanumeric())
}
