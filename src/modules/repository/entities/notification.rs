// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    id,
    modules::{
        database::{
            async_find_impl, filter_by_secondary_key_impl, insert_impl, manager::DB_MANAGER,
            update_impl, upsert_impl,
        },
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    SyncProgress,
    ModifierConflict,
    MailClassified,
    WebhookRenewed,
}

/// The only place user-visible notifications are persisted; `NotificationService`
/// is the sole writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 50, version = 1)]
#[native_db]
pub struct NotificationEntity {
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: i64,
}

impl NotificationEntity {
    pub fn new(user_id: String, kind: NotificationKind, title: String, body: String) -> Self {
        Self {
            id: id!(64),
            user_id,
            kind,
            title,
            body,
            read: false,
            created_at: utc_now!(),
        }
    }

    pub async fn save(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn list_for_user(user_id: &str) -> MailFabricResult<Vec<NotificationEntity>> {
        filter_by_secondary_key_impl(
            DB_MANAGER.meta_db(),
            NotificationEntityKey::user_id,
            user_id.to_owned(),
        )
        .await
    }

    pub async fn mark_read(id: u64) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("notification id={id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current: &NotificationEntity| {
                let mut updated = current.clone();
                updated.read = true;
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }
}

/// Per-user gating: which notification kinds are muted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[native_model(id = 51, version = 1)]
#[native_db]
pub struct NotificationSettings {
    #[primary_key]
    pub user_id: String,
    pub muted_kinds: Vec<String>,
}

impl NotificationSettings {
    pub fn is_muted(&self, kind: &NotificationKind) -> bool {
        let tag = match kind {
            NotificationKind::SyncProgress => "sync_progress",
            NotificationKind::ModifierConflict => "modifier_conflict",
            NotificationKind::MailClassified => "mail_classified",
            NotificationKind::WebhookRenewed => "webhook_renewed",
        };
        self.muted_kinds.iter().any(|k| k == tag)
    }

    pub async fn get(user_id: &str) -> MailFabricResult<Option<NotificationSettings>> {
        async_find_impl(DB_MANAGER.meta_db(), user_id.to_owned()).await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }
}
