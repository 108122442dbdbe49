// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! One pooled adapter per connection, keyed by connection id, so a sync run
//! reuses the same `reqwest`/Graph client instead of re-handshaking TLS on
//! every job. Mirrors the donor's `DashMap`-backed lazy-init pattern used
//! for IMAP/SMTP executors.

use super::credentials::valid_access_token;
use super::gmail::GmailAdapter;
use super::graph::GraphAdapter;
use super::{DeltaResult, MessageIdPage, ModifyAction, ProviderMailMessage, ProviderResult, Subscription};
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailFabricResult;
use crate::modules::repository::entities::connection::{Connection, Provider};
use crate::{raise_error, utc_now};
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

pub static PROVIDER_POOL: LazyLock<ProviderClientPool> = LazyLock::new(ProviderClientPool::new);

/// The provider-specific adapter for one connection. Graph's client is
/// bound to a token at construction, so unlike Gmail's it's rebuilt whenever
/// the pooled token goes stale.
pub enum ProviderClient {
    Gmail(GmailAdapter),
    Graph { adapter: GraphAdapter, token_expires_at: i64 },
}

impl ProviderClient {
    pub async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> ProviderResult<MessageIdPage> {
        match self {
            ProviderClient::Gmail(adapter) => {
                adapter.list_message_ids(access_token, query, page_token).await
            }
            ProviderClient::Graph { adapter, .. } => adapter.list_message_ids("inbox", page_token).await,
        }
    }

    pub async fn get_message(
        &self,
        access_token: &str,
        external_id: &str,
    ) -> ProviderResult<ProviderMailMessage> {
        match self {
            ProviderClient::Gmail(adapter) => adapter.get_message(access_token, external_id).await,
            ProviderClient::Graph { adapter, .. } => adapter.get_message(external_id).await,
        }
    }

    pub async fn delta(&self, access_token: &str, cursor: Option<&str>) -> ProviderResult<DeltaResult> {
        match self {
            ProviderClient::Gmail(adapter) => {
                adapter.delta(access_token, cursor.unwrap_or_default()).await
            }
            ProviderClient::Graph { adapter, .. } => adapter.delta(cursor).await,
        }
    }

    pub async fn modify(
        &self,
        access_token: &str,
        external_id: &str,
        action: ModifyAction,
        add_labels: &[String],
        remove_labels: &[String],
    ) -> ProviderResult<()> {
        match self {
            ProviderClient::Gmail(adapter) => {
                adapter
                    .modify(access_token, external_id, action, add_labels, remove_labels)
                    .await
            }
            ProviderClient::Graph { adapter, .. } => {
                adapter.modify(external_id, action, add_labels).await
            }
        }
    }

    pub async fn watch(&self, access_token: &str, webhook_target: &str) -> ProviderResult<Subscription> {
        match self {
            ProviderClient::Gmail(adapter) => adapter.watch(access_token, webhook_target).await,
            ProviderClient::Graph { adapter, .. } => adapter.watch(webhook_target).await,
        }
    }

    pub async fn unwatch(&self, access_token: &str, subscription_id: &str) -> ProviderResult<()> {
        match self {
            ProviderClient::Gmail(adapter) => adapter.unwatch(access_token).await,
            ProviderClient::Graph { adapter, .. } => adapter.unwatch(subscription_id).await,
        }
    }
}

pub struct ProviderClientPool {
    start_at: i64,
    clients: DashMap<u64, Arc<ProviderClient>>,
}

impl ProviderClientPool {
    fn new() -> Self {
        Self {
            start_at: utc_now!(),
            clients: DashMap::new(),
        }
    }

    pub fn uptime_ms(&self) -> i64 {
        utc_now!() - self.start_at
    }

    /// Returns the pooled adapter for `connection`, refreshing its token and
    /// rebuilding the client first if needed.
    pub async fn get(&self, connection: &Connection) -> MailFabricResult<Arc<ProviderClient>> {
        let access_token = valid_access_token(connection).await?;

        if let Some(client) = self.clients.get(&connection.id) {
            if !Self::needs_rebuild(&client, connection.token_expires_at) {
                return Ok(client.value().clone());
            }
        }

        let new_client = Arc::new(match connection.provider {
            Provider::Gmail => ProviderClient::Gmail(GmailAdapter::new(reqwest::Client::new())),
            Provider::Graph => ProviderClient::Graph {
                adapter: GraphAdapter::new(&access_token),
                token_expires_at: connection.token_expires_at,
            },
        });

        match self.clients.try_entry(connection.id) {
            Some(dashmap::mapref::entry::Entry::Occupied(mut entry)) => {
                if Self::needs_rebuild(entry.get(), connection.token_expires_at) {
                    entry.insert(new_client.clone());
                }
                Ok(entry.get().clone())
            }
            Some(dashmap::mapref::entry::Entry::Vacant(entry)) => {
                entry.insert(new_client.clone());
                Ok(new_client)
            }
            None => Err(raise_error!("provider pool locked".into(), ErrorCode::InternalError)),
        }
    }

    fn needs_rebuild(client: &ProviderClient, current_expiry: i64) -> bool {
        matches!(client, ProviderClient::Graph { token_expires_at, .. } if *token_expires_at != current_expiry)
    }

    pub fn clean(&self, connection_id: u64) {
        self.clients.remove(&connection_id);
    }
}
