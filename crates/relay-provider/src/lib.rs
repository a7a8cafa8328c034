//! Job processing provider client.
//!
//! Submits transcoding jobs with a completion webhook and queries job status
//! for the polling fallback path.

pub mod client;
pub mod error;
pub mod types;

pub use client::{JobProvider, ProviderClient, ProviderConfig};
pub use error::{ProviderError, ProviderResult};
pub use types::{ProviderJobStatus, SubmitJob};
