//! Business logic services.
//!
//! Submission, webhook ingestion and polling all live here; handlers only
//! translate HTTP in and out.

pub mod completion;
pub mod finalizer;
pub mod gateway;
pub mod poller;
pub mod retry;
pub mod webhook;

pub use completion::{Channel, Completion, CompletionCoordinator};
pub use finalizer::{FinalizeError, Finalizer};
pub use gateway::{GatewayError, SubmissionGateway};
pub use poller::{PollError, StatusPoller};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use webhook::WebhookIngestor;
