//! Application state.

use std::sync::Arc;

use anyhow::Context;

use relay_provider::{JobProvider, ProviderClient};
use relay_storage::{ObjectStore, R2Client};
use relay_store::{JobStore, StoreConfig};

use crate::config::{ApiConfig, RelayConfig};
use crate::services::{
    CompletionCoordinator, Finalizer, StatusPoller, SubmissionGateway, WebhookIngestor,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub gateway: Arc<SubmissionGateway>,
    pub webhooks: Arc<WebhookIngestor>,
    pub poller: Arc<StatusPoller>,
    /// Secret expected in the webhook `token` query parameter
    pub webhook_token: Option<String>,
}

impl AppState {
    /// Create application state from environment variables.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let relay = RelayConfig::from_env()?;

        let store_config = StoreConfig::from_env()?;
        let store = relay_store::connect(&store_config)
            .await
            .context("failed to connect job store")?;

        let provider = ProviderClient::from_env().context("failed to create provider client")?;
        let objects = R2Client::from_env()
            .await
            .context("failed to create storage client")?;

        Self::from_parts(config, relay, store, Arc::new(provider), Arc::new(objects))
    }

    /// Wire services from already-built collaborators.
    pub fn from_parts(
        config: ApiConfig,
        relay: RelayConfig,
        store: Arc<dyn JobStore>,
        provider: Arc<dyn JobProvider>,
        objects: Arc<dyn ObjectStore>,
    ) -> anyhow::Result<Self> {
        let finalizer = Finalizer::new(
            Arc::clone(&objects),
            relay.object_prefix.clone(),
            relay.fetch_timeout,
            relay.max_artifact_bytes,
        )
        .context("failed to create artifact HTTP client")?;

        let completion = Arc::new(CompletionCoordinator::new(
            Arc::clone(&store),
            Arc::new(finalizer),
            relay.finalize_lease,
        ));

        let gateway = SubmissionGateway::new(Arc::clone(&provider), Arc::clone(&store), &relay);
        let webhooks = WebhookIngestor::new(Arc::clone(&store), Arc::clone(&completion));
        let poller = StatusPoller::new(
            Arc::clone(&store),
            provider,
            completion,
            relay.default_output_format.clone(),
        );

        Ok(Self {
            config,
            store,
            objects,
            gateway: Arc::new(gateway),
            webhooks: Arc::new(webhooks),
            poller: Arc::new(poller),
            webhook_token: relay.webhook_token,
        })
    }
}
