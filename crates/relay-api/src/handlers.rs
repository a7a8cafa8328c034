//! Request handlers.

pub mod health;
pub mod jobs;
pub mod webhooks;

pub use health::*;
pub use jobs::*;
pub use webhooks::*;
