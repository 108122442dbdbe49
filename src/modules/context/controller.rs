// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! Decouples "this connection needs attention" from the sync engine itself
//! via an mpsc channel, so a caller that discovers this (boot scan, a future
//! webhook ingress, a manual resync request) doesn't block waiting for the
//! job queue to accept the submission.

use crate::modules::error::MailFabricResult;
use crate::modules::repository::entities::sync::{SyncState, SyncStatus};
use crate::modules::sync::{self, MailSyncInitJob};
use crate::modules::tasks::queue::MailFabricJobQueue;
use std::sync::LazyLock;
use tokio::sync::mpsc;
use tracing::error;

pub static SYNC_CONTROLLER: LazyLock<SyncController> = LazyLock::new(SyncController::new);

pub struct SyncController {
    channel: mpsc::Sender<u64>,
}

impl SyncController {
    fn new() -> Self {
        let (tx, mut rx) = mpsc::channel::<u64>(100);

        tokio::spawn(async move {
            while let Some(connection_id) = rx.recv().await {
                if let Err(e) = Self::dispatch(connection_id).await {
                    error!("failed to start sync for connection {}: {:?}", connection_id, e);
                }
            }
        });

        SyncController { channel: tx }
    }

    /// Requests that `connection_id` be synced: a fresh init-plan run if it
    /// has never completed a backfill, an incremental run otherwise.
    pub async fn trigger_start(&self, connection_id: u64) {
        if let Err(e) = self.channel.send(connection_id).await {
            error!("failed to queue sync trigger for connection {}: {:?}", connection_id, e);
        }
    }

    async fn dispatch(connection_id: u64) -> MailFabricResult<()> {
        let state = SyncState::get(connection_id).await?;
        let needs_init = !matches!(
            state,
            Some(ref s) if s.first_sync_complete && s.status != SyncStatus::Failed
        );

        if needs_init {
            MailFabricJobQueue::get()?
                .submit(MailSyncInitJob { connection_id }, None)
                .await
        } else {
            sync::trigger_incremental(connection_id, None).await
        }
    }
}
