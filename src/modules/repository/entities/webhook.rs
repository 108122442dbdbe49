// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    modules::{
        database::{
            async_find_impl, list_all_impl, manager::DB_MANAGER, secondary_find_impl, update_impl,
            upsert_impl,
        },
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum WebhookStatus {
    #[default]
    Active,
    Failed,
    Disabled,
}

/// One active push subscription per `(ConnectionID, Provider)`, renewed ahead of expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 40, version = 1)]
#[native_db]
pub struct WebhookConfig {
    #[primary_key]
    pub connection_id: u64,
    #[secondary_key(unique)]
    pub subscription_id: String,
    pub resource_id: String,
    pub expires_at: i64,
    pub status: WebhookStatus,
    pub failure_count: u32,
    pub last_triggered_at: Option<i64>,
}

impl WebhookConfig {
    pub fn new(connection_id: u64, subscription_id: String, resource_id: String, expires_at: i64) -> Self {
        Self {
            connection_id,
            subscription_id,
            resource_id,
            expires_at,
            status: WebhookStatus::Active,
            failure_count: 0,
            last_triggered_at: None,
        }
    }

    pub async fn get(connection_id: u64) -> MailFabricResult<Option<WebhookConfig>> {
        async_find_impl(DB_MANAGER.meta_db(), connection_id).await
    }

    pub async fn get_by_subscription(subscription_id: &str) -> MailFabricResult<Option<WebhookConfig>> {
        secondary_find_impl(
            DB_MANAGER.meta_db(),
            WebhookConfigKey::subscription_id,
            subscription_id.to_owned(),
        )
        .await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    /// Subscriptions expiring within `window_secs`, the renewal sweep's work set.
    pub async fn list_expiring_within(window_secs: i64) -> MailFabricResult<Vec<WebhookConfig>> {
        let cutoff = utc_now!() + window_secs * 1000;
        let all: Vec<WebhookConfig> = list_all_impl(DB_MANAGER.meta_db()).await?;
        Ok(all
            .into_iter()
            .filter(|w| w.status == WebhookStatus::Active && w.expires_at <= cutoff)
            .collect())
    }

    pub async fn mark_triggered(connection_id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("webhook config for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current: &WebhookConfig| {
                let mut updated = current.clone();
                updated.last_triggered_at = Some(utc_now!());
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn mark_renewal_failed(connection_id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("webhook config for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current: &WebhookConfig| {
                let mut updated = current.clone();
                updated.failure_count += 1;
                updated.status = WebhookStatus::Failed;
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn delete(connection_id: u64) -> MailFabricResult<()> {
        crate::modules::database::delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get()
                .primary(connection_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| {
                    raise_error!(
                        format!("webhook config for connection={connection_id} not found"),
                        ErrorCode::ResourceNotFound
                    )
                })
        })
        .await
    }
}
