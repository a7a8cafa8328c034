//! Provider client error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to configure provider client: {0}")]
    ConfigError(String),

    #[error("Job not found upstream: {0}")]
    NotFound(String),

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// The provider authoritatively reported that it no longer tracks the job.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    /// Raw response body, when the provider sent one.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ProviderError::Api { body, .. } | ProviderError::NotFound(body) => Some(body),
            ProviderError::InvalidResponse(body) => Some(body),
            _ => None,
        }
    }
}
