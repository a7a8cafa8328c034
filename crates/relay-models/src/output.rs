//! Provider status and output normalization.
//!
//! The provider reports outputs in several shapes (a bare URL, a list of
//! URLs, an object with a `url` key, or a list of such objects). Everything
//! is parsed into [`ProviderOutput`] once at ingestion and reduced to a single
//! [`OutputLocation`] before it reaches finalization.

use serde::{Deserialize, Serialize};
use url::Url;

/// Status vocabulary reported by the provider, mapped onto our lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Queued,
    Processing,
    Finished,
    Error,
    /// Any other intermediate status, kept verbatim.
    Other(String),
}

impl ProviderStatus {
    /// Parse a raw provider status string (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" | "in_queue" => ProviderStatus::Queued,
            "processing" | "started" | "running" | "in_progress" => ProviderStatus::Processing,
            "finished" | "completed" | "succeeded" | "success" => ProviderStatus::Finished,
            "error" | "failed" | "failure" | "cancelled" | "canceled" => ProviderStatus::Error,
            _ => ProviderStatus::Other(raw.trim().to_string()),
        }
    }
}

/// An output entry shaped as an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputObject {
    #[serde(default, alias = "file_url", alias = "output_url")]
    pub url: Option<String>,
}

/// Every output shape the provider is known to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderOutput {
    Url(String),
    List(Vec<ProviderOutput>),
    Object(OutputObject),
    Unrecognized(serde_json::Value),
}

impl ProviderOutput {
    /// Parse an arbitrary JSON value. Never fails; unknown shapes become
    /// [`ProviderOutput::Unrecognized`].
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(ProviderOutput::Unrecognized(value))
    }

    /// First usable output location, if any.
    pub fn location(&self) -> Option<OutputLocation> {
        match self {
            ProviderOutput::Url(url) => OutputLocation::new(url),
            ProviderOutput::List(items) => items.iter().find_map(ProviderOutput::location),
            ProviderOutput::Object(obj) => obj.url.as_deref().and_then(OutputLocation::new),
            ProviderOutput::Unrecognized(_) => None,
        }
    }
}

/// A non-empty output URL extracted from a provider payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation(String);

impl OutputLocation {
    /// Wrap a raw URL string; blank strings yield `None`.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension of the URL path (lowercased), if it has one.
    pub fn extension(&self) -> Option<String> {
        let url = Url::parse(&self.0).ok()?;
        let last = url.path_segments()?.next_back()?;
        let (_, ext) = last.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl std::fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
