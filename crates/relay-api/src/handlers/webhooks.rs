//! Provider webhook handler.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use relay_models::{WebhookAck, WebhookDisposition, WebhookPayload};

use crate::auth::webhook_token_matches;
use crate::metrics;
use crate::state::AppState;

/// Query parameters the provider echoes back from the registered callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

/// Receive a provider status push.
///
/// Always answers 200 so the provider never retries a delivery; what
/// happened is reported as `received` or `ignored`. Bodies that cannot be
/// read, including ones over the size limit, are ignored.
pub async fn provider_webhook(
    State(state): State<AppState>,
    query: Option<Query<WebhookQuery>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookAck> {
    let disposition = match body {
        Ok(body) => {
            let query = query.map(|Query(q)| q).unwrap_or_default();
            receive(&state, query, &body).await
        }
        Err(e) => {
            warn!(error = %e, status = %e.status(), "Unreadable webhook body");
            WebhookDisposition::Ignored
        }
    };
    metrics::record_webhook_delivery(disposition.as_str());
    Json(WebhookAck {
        status: disposition,
    })
}

async fn receive(state: &AppState, query: WebhookQuery, body: &[u8]) -> WebhookDisposition {
    if let Some(expected) = &state.webhook_token {
        if !webhook_token_matches(expected, query.token.as_deref()) {
            warn!("Webhook rejected: token mismatch");
            return WebhookDisposition::Ignored;
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Malformed webhook payload");
            return WebhookDisposition::Ignored;
        }
    };

    state.webhooks.receive(payload).await
}
