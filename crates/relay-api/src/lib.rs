//! Axum HTTP server for the transcoding relay.
//!
//! This crate provides:
//! - Job submission to the processing provider
//! - Webhook ingestion and status polling, both converging on finalization
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, RelayConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
