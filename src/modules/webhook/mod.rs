// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The Webhook Manager: keeps at most one active push subscription
//! per connection, renews it ahead of expiry, and turns an inbound push into
//! a queued incremental sync. Ingress (the HTTP endpoint a provider actually
//! posts to) lives above this module; [`WebhookManager::handle_push`] is the
//! seam it calls into once the payload is normalized.

use crate::modules::context::RustMailTask;
use crate::modules::error::MailFabricResult;
use crate::modules::provider::credentials::valid_access_token;
use crate::modules::provider::pool::PROVIDER_POOL;
use crate::modules::repository::entities::connection::Connection;
use crate::modules::repository::entities::sync::{SyncCursor, SyncState, SyncStatus};
use crate::modules::repository::entities::webhook::WebhookConfig;
use crate::modules::scheduler::periodic::PeriodicTask;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::sync;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// A provider push notification, stripped of transport-specific framing by
/// whatever ingress endpoint received it. `history_id` is Gmail's cursor hint
/// carried on the push; Graph subscriptions don't carry one and leave it `None`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizedPush {
    pub subscription_id: String,
    pub history_id: Option<String>,
}

pub struct WebhookManager;

impl WebhookManager {
    /// Resolves an inbound push to its connection and queues an incremental
    /// sync. A push for a subscription we no longer recognize (already torn
    /// down, or never ours) is logged and dropped, not an error: providers
    /// don't wait for acknowledgement of "we don't know this subscription".
    pub async fn handle_push(raw: NormalizedPush) -> MailFabricResult<()> {
        let Some(config) = WebhookConfig::get_by_subscription(&raw.subscription_id).await? else {
            warn!("push for unknown subscription {}", raw.subscription_id);
            return Ok(());
        };

        WebhookConfig::mark_triggered(config.connection_id).await?;
        let history_hint = raw.history_id.map(|id| SyncCursor(Some(id)));
        sync::trigger_incremental(config.connection_id, history_hint).await
    }

    /// Creates a subscription for `connection` if it has none, or renews one
    /// already within the renewal window. No-op otherwise.
    async fn ensure_subscription(connection: &Connection) -> MailFabricResult<()> {
        let existing = WebhookConfig::get(connection.id).await?;
        let renew_window_ms = SETTINGS.webhook_renew_window_hours * 60 * 60 * 1000;
        let needs_renewal = existing
            .as_ref()
            .map(|w| w.expires_at <= crate::utc_now!() + renew_window_ms)
            .unwrap_or(true);
        if !needs_renewal {
            return Ok(());
        }

        let access_token = valid_access_token(connection).await?;
        let client = PROVIDER_POOL.get(connection).await?;
        match client.watch(&access_token, &SETTINGS.webhook_callback_url).await {
            Ok(subscription) => {
                WebhookConfig::new(
                    connection.id,
                    subscription.subscription_id,
                    subscription.resource_id,
                    subscription.expires_at,
                )
                .upsert()
                .await?;
                info!("webhook subscription ensured for connection {}", connection.id);
                Ok(())
            }
            Err(e) => {
                warn!("webhook subscribe failed for connection {}: {:?}", connection.id, e);
                if existing.is_some() {
                    WebhookConfig::mark_renewal_failed(connection.id).await?;
                }
                Ok(())
            }
        }
    }

    /// Tears down a connection's subscription; called when a connection is
    /// disabled or deleted so the provider stops pushing to a dead listener.
    pub async fn teardown(connection: &Connection) -> MailFabricResult<()> {
        let Some(config) = WebhookConfig::get(connection.id).await? else {
            return Ok(());
        };
        let access_token = valid_access_token(connection).await?;
        let client = PROVIDER_POOL.get(connection).await?;
        if let Err(e) = client.unwatch(&access_token, &config.subscription_id).await {
            warn!("webhook unwatch failed for connection {}: {:?}", connection.id, e);
        }
        WebhookConfig::delete(connection.id).await
    }
}

/// Periodic sweep: every enabled, fully-synced connection either gets a
/// fresh subscription or has its existing one renewed ahead of expiry.
pub struct WebhookRenewalTask;

impl RustMailTask for WebhookRenewalTask {
    fn start() {
        let periodic_task = PeriodicTask::new("webhook-renewal-task");
        let task = move |_: Option<u64>| Box::pin(async move { sweep_subscriptions().await });
        periodic_task.start(task, None, Duration::from_secs(60 * 60), false, true);
    }
}

async fn sweep_subscriptions() -> MailFabricResult<()> {
    for connection in Connection::list_enabled().await? {
        let Some(state) = SyncState::get(connection.id).await? else {
            continue;
        };
        if state.status != SyncStatus::Completed {
            continue;
        }
        if let Err(e) = WebhookManager::ensure_subscription(&connection).await {
            warn!("webhook sweep failed for connection {}: {:?}", connection.id, e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_push_round_trips_through_serde() {
        let push = NormalizedPush {
            subscription_id: "sub-1".to_owned(),
            history_id: Some("12345".to_owned()),
        };
        let json = serde_json::to_string(&push).unwrap();
        let back: NormalizedPush = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subscription_id, "sub-1");
        assert_eq!(back.history_id.as_deref(), Some("12345"));
    }
}
