//! Durable object storage client.
//!
//! This crate provides:
//! - The [`ObjectStore`] contract used by result finalization
//! - An R2/S3 implementation issuing presigned PUT URLs
//! - Deterministic object naming and content-type mapping

pub mod client;
pub mod error;
pub mod naming;

pub use client::{ObjectStore, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use naming::{content_type_for, object_name};
