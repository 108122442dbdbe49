// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use tracing::info;

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::META_MODELS;
use crate::modules::repository::entities::mail::MAIL_MODELS;
use crate::modules::scheduler::nativedb::JOB_MODELS;
use crate::modules::settings::dir::{JOBS_FILE, MAIL_FILE, META_FILE};
use crate::{
    modules::{
        context::RustMailTask,
        error::{code::ErrorCode, MailFabricResult},
        scheduler::periodic::PeriodicTask,
        settings::cli::SETTINGS,
    },
    raise_error,
};
use native_db::{db_type, Database, Models};
use std::{path::PathBuf, time::Duration};

const TASK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60); // Daily backups

/// Periodically snapshots the meta, jobs, and mail databases to a configured
/// backup directory, retaining a bounded number of recent backups per file.
pub struct DatabaseBackupTask;

impl RustMailTask for DatabaseBackupTask {
    fn start() {
        let Some(backup_dir) = SETTINGS.backup_dir.clone() else {
            info!("Backup task skipped: no backup directory specified");
            return;
        };
        let periodic_task = PeriodicTask::new("database-backup-task");
        let task = move |_: Option<u64>| {
            let backup_dir = backup_dir.clone();
            Box::pin(async move {
                DatabaseBackupTask::backup_all(&backup_dir, SETTINGS.max_backups)
                    .await
                    .map_err(|e| {
                        raise_error!(
                            format!("Backup task failed: {:#?}", e),
                            ErrorCode::InternalError
                        )
                    })?;
                info!(
                    "Backup task completed successfully. Directory: {}, Max backups per file: {}",
                    backup_dir.display(),
                    SETTINGS.max_backups
                );
                Ok(())
            })
        };

        periodic_task.start(task, None, TASK_INTERVAL, false, false);
    }
}

impl DatabaseBackupTask {
    pub async fn backup_all(backup_dir: &PathBuf, max_backups: usize) -> MailFabricResult<()> {
        tokio::fs::create_dir_all(backup_dir).await.map_err(|e| {
            raise_error!(
                format!("Failed to create backup directory: {:#?}", e),
                ErrorCode::InternalError
            )
        })?;

        Self::backup_one(backup_dir, META_FILE, &META_MODELS, DB_MANAGER.meta_db().clone())
            .await?;
        Self::backup_one(backup_dir, JOBS_FILE, &JOB_MODELS, DB_MANAGER.jobs_db().clone())
            .await?;
        Self::backup_one(backup_dir, MAIL_FILE, &MAIL_MODELS, DB_MANAGER.mail_db().clone())
            .await?;

        Self::prune_old_backups(backup_dir, META_FILE, max_backups).await?;
        Self::prune_old_backups(backup_dir, JOBS_FILE, max_backups).await?;
        Self::prune_old_backups(backup_dir, MAIL_FILE, max_backups).await?;
        Ok(())
    }

    async fn backup_one(
        backup_dir: &PathBuf,
        file_name: &str,
        models: &'static Models,
        db: std::sync::Arc<Database<'static>>,
    ) -> MailFabricResult<()> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let backup_path = backup_dir.join(format!("{}_{}", timestamp, file_name));

        tokio::task::spawn_blocking(move || db.snapshot(models, &backup_path))
            .await
            .map_err(|join_err| {
                raise_error!(
                    format!("Snapshot task panicked: {:#?}", join_err),
                    ErrorCode::InternalError
                )
            })?
            .map_err(|e: db_type::Error| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }

    async fn prune_old_backups(
        backup_dir: &PathBuf,
        file_name: &str,
        max_backups: usize,
    ) -> MailFabricResult<()> {
        let suffix = format!("_{}", file_name);
        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(backup_dir).await.map_err(|e| {
            raise_error!(
                format!("Failed to read backup directory: {:#?}", e),
                ErrorCode::InternalError
            )
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            raise_error!(
                format!("Failed to read backup directory entry: {:#?}", e),
                ErrorCode::InternalError
            )
        })? {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(&suffix) {
                    backups.push((path.clone(), name.to_string()));
                }
            }
        }

        backups.sort_by(|a, b| b.1.cmp(&a.1));
        let backups_to_keep = backups.iter().take(max_backups).collect::<Vec<_>>();
        for old_backup in backups.iter() {
            if !backups_to_keep.contains(&old_backup) {
                tokio::fs::remove_file(&old_backup.0).await.map_err(|e| {
                    raise_error!(
                        format!("Failed to delete old backup {}: {:#?}", old_backup.1, e),
                        ErrorCode::InternalError
                    )
                })?;
            }
        }
        Ok(())
    }
}
