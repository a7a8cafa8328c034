//! API configuration.

use std::time::Duration;

use relay_models::DEFAULT_OUTPUT_FORMAT;
use thiserror::Error;
use url::Url;

/// Path the provider pushes status changes to.
pub const WEBHOOK_PATH: &str = "/api/webhooks/provider";

/// Configuration errors detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second (per client IP)
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Job relay behavior: callbacks, retries, finalization.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Externally reachable base URL of this service
    pub public_base_url: Url,
    /// Shared secret the provider echoes back on webhook calls
    pub webhook_token: Option<String>,
    /// Provider submission attempts before giving up
    pub submit_max_attempts: u32,
    /// Delay before the first submission retry; doubles per retry
    pub submit_backoff: Duration,
    /// Bound on each submission attempt
    pub submit_attempt_timeout: Duration,
    /// Prefix of durable object names
    pub object_prefix: String,
    /// Bound on fetching and uploading an artifact
    pub fetch_timeout: Duration,
    /// Largest artifact accepted for relocation
    pub max_artifact_bytes: u64,
    /// How long a finalization lease stays valid
    pub finalize_lease: Duration,
    /// Output format used when the caller omits one
    pub default_output_format: String,
}

impl RelayConfig {
    /// Config with defaults for everything but the public URL.
    pub fn new(public_base_url: Url) -> Self {
        Self {
            public_base_url,
            webhook_token: None,
            submit_max_attempts: 3,
            submit_backoff: Duration::from_secs(2),
            submit_attempt_timeout: Duration::from_secs(60),
            object_prefix: "transcode".to_string(),
            fetch_timeout: Duration::from_secs(60),
            max_artifact_bytes: 1024 * 1024 * 1024, // 1GB
            finalize_lease: Duration::from_secs(300),
            default_output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("PUBLIC_BASE_URL")
            .map_err(|_| ConfigError::Missing("PUBLIC_BASE_URL"))?;
        let public_base_url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
            name: "PUBLIC_BASE_URL",
            reason: e.to_string(),
        })?;
        if !matches!(public_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "PUBLIC_BASE_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let defaults = Self::new(public_base_url);
        Ok(Self {
            webhook_token: std::env::var("PROVIDER_WEBHOOK_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            submit_max_attempts: env_parse("SUBMIT_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.submit_max_attempts),
            submit_backoff: env_parse("SUBMIT_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.submit_backoff),
            submit_attempt_timeout: env_parse("PROVIDER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_attempt_timeout),
            object_prefix: std::env::var("STORAGE_OBJECT_PREFIX")
                .unwrap_or_else(|_| defaults.object_prefix.clone()),
            fetch_timeout: env_parse("FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            max_artifact_bytes: env_parse("MAX_ARTIFACT_BYTES")
                .unwrap_or(defaults.max_artifact_bytes),
            finalize_lease: env_parse("FINALIZE_LEASE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.finalize_lease),
            ..defaults
        })
    }

    /// Webhook URL registered with every submission.
    pub fn callback_url(&self) -> String {
        let base = self.public_base_url.as_str().trim_end_matches('/');
        let mut url = format!("{}{}", base, WEBHOOK_PATH);
        if let Some(token) = &self.webhook_token {
            if let Ok(mut parsed) = Url::parse(&url) {
                parsed.query_pairs_mut().append_pair("token", token);
                url = parsed.into();
            }
        }
        url
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
