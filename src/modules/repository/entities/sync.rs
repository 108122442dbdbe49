// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::{
    modules::{
        database::{manager::DB_MANAGER, update_impl, upsert_impl},
        error::{code::ErrorCode, MailFabricResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SyncPhase {
    #[default]
    Recent,
    Full,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SyncStatus {
    #[default]
    Pending,
    Syncing,
    Completed,
    Failed,
    Retrying,
}

/// Resumable pointer into an in-progress page walk; non-empty iff a
/// `PageFanout` run was interrupted mid-sync.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub page_token: Option<String>,
    pub synced_count: u64,
    pub total_count: u64,
}

/// Gmail's history id is a decimal string, numerically comparable; Graph's
/// delta link is opaque and only ever compared by arrival order. Both are
/// carried as the same newtype so the engine never special-cases the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor(pub Option<String>);

impl SyncCursor {
    pub fn as_decimal(&self) -> Option<u64> {
        self.0.as_deref().and_then(|s| s.parse().ok())
    }

    /// `true` if `other` is strictly newer. Falls back to "always advance"
    /// for non-numeric (Graph) cursors, matching last-write-wins per adapter.
    pub fn is_older_than(&self, other: &SyncCursor) -> bool {
        match (self.as_decimal(), other.as_decimal()) {
            (Some(a), Some(b)) => a < b,
            _ => self.0 != other.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 10, version = 1)]
#[native_db]
pub struct SyncState {
    #[primary_key]
    pub connection_id: u64,
    pub phase: SyncPhase,
    pub status: SyncStatus,
    pub history_id: SyncCursor,
    pub next_history_id: Option<SyncCursor>,
    pub watch_id: Option<String>,
    pub watch_expiry: Option<i64>,
    pub checkpoint: Checkpoint,
    pub retry_count: u32,
    pub next_retry_at: Option<i64>,
    pub last_error: Option<String>,
    pub last_sync_at: Option<i64>,
    pub first_sync_complete: bool,
    pub duration_ms: Option<u64>,
}

impl SyncState {
    pub fn new(connection_id: u64) -> Self {
        Self {
            connection_id,
            phase: SyncPhase::Recent,
            status: SyncStatus::Pending,
            history_id: SyncCursor::default(),
            next_history_id: None,
            watch_id: None,
            watch_expiry: None,
            checkpoint: Checkpoint::default(),
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
            last_sync_at: None,
            first_sync_complete: false,
            duration_ms: None,
        }
    }

    pub async fn get(connection_id: u64) -> MailFabricResult<Option<SyncState>> {
        crate::modules::database::async_find_impl(DB_MANAGER.meta_db(), connection_id).await
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    /// Optimistic transition enforcing "only one run owns this connection's sync".
    pub async fn begin_run(connection_id: u64) -> MailFabricResult<bool> {
        if Self::get(connection_id).await?.is_none() {
            Self::new(connection_id).upsert().await?;
        }
        let result = update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("sync state for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |c| {
                if c.status == SyncStatus::Syncing {
                    return Err(raise_error!(
                        "sync already in progress".to_string(),
                        ErrorCode::Conflict
                    ));
                }
                let mut updated = c.clone();
                updated.status = SyncStatus::Syncing;
                Ok(updated)
            },
        )
        .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::Conflict => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Applies `history_id` only if strictly newer, preserving monotonicity
    /// against a concurrent webhook-triggered run.
    pub async fn update_history_id_if_greater(
        connection_id: u64,
        candidate: SyncCursor,
    ) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("sync state for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |c| {
                let mut updated = c.clone();
                if c.history_id.is_older_than(&candidate) {
                    updated.history_id = candidate.clone();
                }
                updated.last_sync_at = Some(utc_now!());
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Coalesces a webhook push that arrives while another incremental run
    /// already owns this connection: stashes `candidate` in `next_history_id`
    /// if it is newer than whatever is already stashed there, so the
    /// in-flight run can pick it up on completion instead of the push being lost.
    pub async fn stash_next_history_id_if_greater(
        connection_id: u64,
        candidate: SyncCursor,
    ) -> MailFabricResult<()> {
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("sync state for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |c| {
                let mut updated = c.clone();
                let should_replace = match &c.next_history_id {
                    Some(existing) => existing.is_older_than(&candidate),
                    None => true,
                };
                if should_replace {
                    updated.next_history_id = Some(candidate.clone());
                }
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Releases the lock an incremental run acquired via [`Self::begin_run`]:
    /// applies `learned` (the delta cursor the run itself produced) if it's
    /// newer than the stored one, clears any stashed `next_history_id`, and
    /// returns it so the caller can requeue a follow-up run for the push that
    /// arrived mid-run.
    pub async fn finish_incremental_run(
        connection_id: u64,
        learned: Option<SyncCursor>,
    ) -> MailFabricResult<Option<SyncCursor>> {
        let previous = update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary(connection_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("sync state for connection={connection_id} not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |c| {
                let mut updated = c.clone();
                if let Some(candidate) = &learned {
                    if c.history_id.is_older_than(candidate) {
                        updated.history_id = candidate.clone();
                    }
                }
                updated.status = SyncStatus::Completed;
                updated.last_sync_at = Some(utc_now!());
                updated.next_history_id = None;
                Ok(updated)
            },
        )
        .await?;
        Ok(previous.next_history_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 11, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct CalendarSyncState {
    #[secondary_key]
    pub connection_id: u64,
    pub calendar_id: String,
    pub sync_token: Option<String>,
    pub watch_id: Option<String>,
    pub watch_expiry: Option<i64>,
    pub status: SyncStatus,
    pub last_sync_at: Option<i64>,
}

impl CalendarSyncState {
    fn pk(&self) -> String {
        format!("{}_{}", self.connection_id, self.calendar_id)
    }

    pub async fn upsert(&self) -> MailFabricResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn get(connection_id: u64, calendar_id: &str) -> MailFabricResult<Option<CalendarSyncState>> {
        crate::modules::database::async_find_impl(
            DB_MANAGER.meta_db(),
            format!("{connection_id}_{calendar_id}"),
        )
        .await
    }

    pub async fn list_by_connection(connection_id: u64) -> MailFabricResult<Vec<CalendarSyncState>> {
        crate::modules::database::filter_by_secondary_key_impl(
            DB_MANAGER.meta_db(),
            CalendarSyncStateKey::connection_id,
            connection_id,
        )
        .await
    }
}
