// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    id,
    modules::{
        database::{
            delete_impl, filter_by_secondary_key_impl, insert_impl, manager::DB_MANAGER,
            paginate_secondary_scan_impl, secondary_find_impl, update_impl, upsert_impl,
            Paginated,
        },
        error::{code::ErrorCode, MailFabricResult},
        utils::mail_id,
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub static MAIL_MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut models = Models::new();
    models.define::<MailEntity>().expect("failed to define model");
    models
        .define::<MailBodyEntity>()
        .expect("failed to define model");
    models
        .define::<MailThreadEntity>()
        .expect("failed to define model");
    models
        .define::<EmailAttachmentEntity>()
        .expect("failed to define model");
    models
        .define::<EmailVersion>()
        .expect("failed to define model");
    models
});

/// A synced message's envelope and classification state. The message body is
/// never embedded here; it lives in [`MailBodyEntity`] behind a TTL cache so a
/// large mailbox's metadata stays cheap to scan and paginate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct MailEntity {
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key]
    pub connection_id: u64,
    pub external_id: String,
    /// Deterministic hash of (connection_id, external_id); the uniqueness invariant
    /// a provider re-delivering the same message must collapse onto one row.
    #[secondary_key(unique)]
    pub mail_id: u64,
    #[secondary_key]
    pub thread_id: String,
    pub subject: String,
    pub from_addr: String,
    pub to_addrs: Vec<String>,
    pub internal_date: i64,
    pub snippet: String,
    pub labels: Vec<String>,
    pub ai_is_urgent: bool,
    pub ai_priority: f32,
    pub ai_category: Option<String>,
    pub body_cached: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MailEntity {
    fn pk(&self) -> String {
        format!("{}_{}", self.internal_date, self.id)
    }

    pub fn new(
        connection_id: u64,
        external_id: String,
        thread_id: String,
        subject: String,
        from_addr: String,
        to_addrs: Vec<String>,
        internal_date: i64,
        snippet: String,
        labels: Vec<String>,
    ) -> Self {
        let now = utc_now!();
        Self {
            id: id!(64),
            mail_id: mail_id(connection_id, &external_id),
            connection_id,
            external_id,
            thread_id,
            subject,
            from_addr,
            to_addrs,
            internal_date,
            snippet,
            labels,
            ai_is_urgent: false,
            ai_priority: 0.0,
            ai_category: None,
            body_cached: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.mail_db(), self.to_owned()).await
    }

    pub async fn get(id: u64) -> MailFabricResult<Option<MailEntity>> {
        secondary_find_impl(DB_MANAGER.mail_db(), MailEntityKey::id, id).await
    }

    pub async fn get_by_mail_id(mail_id: u64) -> MailFabricResult<Option<MailEntity>> {
        secondary_find_impl(DB_MANAGER.mail_db(), MailEntityKey::mail_id, mail_id).await
    }

    pub async fn list_by_connection(connection_id: u64) -> MailFabricResult<Vec<MailEntity>> {
        filter_by_secondary_key_impl(DB_MANAGER.mail_db(), MailEntityKey::connection_id, connection_id)
            .await
    }

    pub async fn paginate_by_connection(
        connection_id: u64,
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
    ) -> MailFabricResult<Paginated<MailEntity>> {
        paginate_secondary_scan_impl(
            DB_MANAGER.mail_db(),
            page,
            page_size,
            desc,
            MailEntityKey::connection_id,
            connection_id,
        )
        .await
    }

    /// Applies a classification verdict. `is_urgent` and `priority >= 0.80` must
    /// agree: the AI orchestrator enforces this before calling in, this just persists it.
    pub async fn apply_classification(
        id: u64,
        category: Option<String>,
        priority: f32,
        is_urgent: bool,
    ) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.mail_db(),
            move |rw| {
                rw.get()
                    .secondary::<MailEntity>(MailEntityKey::id, id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(format!("mail id={id} not found"), ErrorCode::ResourceNotFound)
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.ai_category = category;
                updated.ai_priority = priority;
                updated.ai_is_urgent = is_urgent;
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn delete(id: u64) -> MailFabricResult<()> {
        delete_impl(DB_MANAGER.mail_db(), move |rw| {
            rw.get()
                .secondary::<MailEntity>(MailEntityKey::id, id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| {
                    raise_error!(format!("mail id={id} not found"), ErrorCode::ResourceNotFound)
                })
        })
        .await
    }
}

/// Cached message body, evicted by `body_cache_ttl_days`. Keyed by `mail_id`
/// so a cache miss is a provider re-fetch keyed on the same stable identity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct MailBodyEntity {
    #[primary_key]
    pub mail_id: u64,
    pub content_fingerprint: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub cached_at: i64,
    pub expires_at: i64,
}

impl MailBodyEntity {
    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.mail_db(), self.to_owned()).await
    }

    pub async fn get(mail_id: u64) -> MailFabricResult<Option<MailBodyEntity>> {
        crate::modules::database::async_find_impl(DB_MANAGER.mail_db(), mail_id).await
    }

    pub async fn delete_expired(now: i64) -> MailFabricResult<usize> {
        crate::modules::database::batch_delete_impl(DB_MANAGER.mail_db(), move |rw| {
            use itertools::Itertools;
            let all: Vec<MailBodyEntity> = rw
                .scan()
                .primary()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .all()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(all.into_iter().filter(|b| b.expires_at <= now).collect())
        })
        .await
    }
}

/// Groups messages sharing a provider thread key so clients can render a
/// conversation without re-deriving it from individual message headers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 3, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct MailThreadEntity {
    #[secondary_key(unique)]
    pub thread_key: String,
    #[secondary_key]
    pub connection_id: u64,
    pub participants: Vec<String>,
    pub message_count: u32,
    pub last_message_at: i64,
}

impl MailThreadEntity {
    fn pk(&self) -> String {
        format!("{}_{}", self.connection_id, self.thread_key)
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.mail_db(), self.to_owned()).await
    }

    pub async fn get(thread_key: &str) -> MailFabricResult<Option<MailThreadEntity>> {
        secondary_find_impl(
            DB_MANAGER.mail_db(),
            MailThreadEntityKey::thread_key,
            thread_key.to_owned(),
        )
        .await
    }
}

/// A stored attachment reference. `storage_ref` is an opaque pointer the
/// caller's blob store resolves; this core never buffers attachment bytes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 4, version = 1)]
#[native_db]
pub struct EmailAttachmentEntity {
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub mail_id: u64,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub storage_ref: String,
}

impl EmailAttachmentEntity {
    pub async fn insert(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.mail_db(), self.to_owned()).await
    }

    pub async fn list_by_mail(mail_id: u64) -> MailFabricResult<Vec<EmailAttachmentEntity>> {
        filter_by_secondary_key_impl(
            DB_MANAGER.mail_db(),
            EmailAttachmentEntityKey::mail_id,
            mail_id,
        )
        .await
    }
}

/// One point-in-time snapshot of a mail's mutable fields, retained so a
/// conflicting local/remote modifier can be diffed against what changed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 5, version = 1)]
#[native_db]
pub struct EmailVersion {
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub mail_id: u64,
    pub version_no: u32,
    pub snapshot_json: String,
    pub created_at: i64,
}

impl EmailVersion {
    pub async fn insert(&self) -> MailFabricResult<()> {
        insert_impl(DB_MANAGER.mail_db(), self.to_owned()).await
    }

    pub async fn list_by_mail(mail_id: u64) -> MailFabricResult<Vec<EmailVersion>> {
        filter_by_secondary_key_impl(
            DB_MANAGER.mail_db(),
            EmailVersionKey::mail_id,
            mail_id,
        )
        .await
    }
}
