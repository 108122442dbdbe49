// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    modules::{
        database::{async_find_impl, batch_delete_impl, manager::DB_MANAGER, upsert_impl},
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// L2 of the AI orchestrator's two-tier cache: a shared/remote tier
/// behind the same repository seam as every other persisted entity, keyed by
/// a `blake3` fingerprint of the normalized prompt. L1 is in-process and
/// never touches this store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 60, version = 1)]
#[native_db]
pub struct CacheEntry {
    #[primary_key]
    pub fingerprint: String,
    pub response_json: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl CacheEntry {
    pub fn new(fingerprint: String, response_json: String, ttl_secs: i64) -> Self {
        let now = utc_now!();
        Self {
            fingerprint,
            response_json,
            created_at: now,
            expires_at: now + ttl_secs * 1000,
        }
    }

    pub async fn get(fingerprint: &str) -> MailFabricResult<Option<CacheEntry>> {
        let entry: Option<CacheEntry> =
            async_find_impl(DB_MANAGER.meta_db(), fingerprint.to_owned()).await?;
        Ok(entry.filter(|e| e.expires_at > utc_now!()))
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn delete_expired() -> MailFabricResult<usize> {
        let now = utc_now!();
        batch_delete_impl(DB_MANAGER.meta_db(), move |rw| {
            use itertools::Itertools;
            let all: Vec<CacheEntry> = rw
                .scan()
                .primary()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .all()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(all.into_iter().filter(|e| e.expires_at <= now).collect())
        })
        .await
    }
}
