use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use native_db::Database;
use tracing::debug;

use crate::{
    modules::{
        database::{
            batch_delete_impl, batch_insert_impl, batch_update_impl, filter_by_secondary_key_impl,
            insert_impl, paginate_secondary_scan_impl, secondary_find_impl, update_impl, Paginated,
        },
        error::{code::ErrorCode, MailFabricResult},
        metrics::{MAILFABRIC_JOB_FETCH_DURATION, MAILFABRIC_JOB_QUEUE_LENGTH},
        scheduler::{
            model::{JobMeta, JobStatus},
            nativedb::{JobMetaEntity, JobMetaEntityKey},
            store::TaskStore,
        },
        settings::cli::SETTINGS,
    },
    raise_error, utc_now,
};

const HOUR_TO_MS: u64 = 60 * 60 * 1000;

#[derive(Clone)]
pub struct NativeDbTaskStore {
    pub store: Arc<Database<'static>>,
}

impl NativeDbTaskStore {
    pub fn init(database: Arc<Database<'static>>) -> Self {
        Self {
            store: database.clone(),
        }
    }

    pub async fn fetch_pending_tasks(
        database: &Arc<Database<'static>>,
    ) -> MailFabricResult<Vec<JobMeta>> {
        let start = Instant::now();
        let result: Vec<JobMetaEntity> = batch_update_impl(
            database,
            |rw| {
                let candidates: Vec<JobMetaEntity> = rw
                    .scan()
                    .secondary(JobMetaEntityKey::status)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .start_with(JobStatus::Scheduled.code())
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .try_collect()
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;

                for (queue, count) in candidates.iter().counts_by(|c| c.queue_name.clone()) {
                    MAILFABRIC_JOB_QUEUE_LENGTH
                        .with_label_values(&[&queue])
                        .set(count as i64);
                }

                Ok(candidates
                    .into_iter()
                    .filter(|c| c.next_run <= utc_now!())
                    .take(500)
                    .collect())
            },
            move |data| {
                let mut result = Vec::new();
                for entity in data.iter() {
                    let mut updated = entity.clone();
                    updated.status = JobStatus::Running;
                    updated.updated_at = utc_now!();
                    result.push((entity.clone(), updated));
                }
                Ok(result)
            },
        )
        .await?;

        let elapsed = start.elapsed();
        MAILFABRIC_JOB_FETCH_DURATION.observe(elapsed.as_secs_f64());
        debug!("Time taken to fetch job from native_db: {:#?}", elapsed);

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn update_status(
        database: &Arc<Database<'static>>,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> MailFabricResult<()> {
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<JobMetaEntity>(JobMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!(
                                "The job with id={} that you want to modify was not found.",
                                &task_id
                            ),
                            ErrorCode::JobNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.last_duration_ms = last_duration_ms;
                updated.retry_count = retry_count;
                updated.updated_at = utc_now!();
                match (updated.status.clone(), is_success) {
                    (JobStatus::Stopped | JobStatus::Removed, false) => {
                        updated.last_error = last_error;
                    }
                    (_, true) => {
                        updated.status = JobStatus::Success;
                    }
                    (_, false) => {
                        updated.last_error = last_error;
                        match next_run {
                            Some(next_run) => {
                                updated.next_run = next_run;
                                updated.status = JobStatus::Scheduled;
                            }
                            None => updated.status = JobStatus::DeadLetter,
                        }
                    }
                }
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn clean_up(database: &Arc<Database<'static>>) -> MailFabricResult<()> {
        let statuses_to_clean = [
            JobStatus::Removed,
            JobStatus::Success,
            JobStatus::Failed,
            JobStatus::Stopped,
            JobStatus::DeadLetter,
        ];

        let cleanup_interval_ms = SETTINGS.cleanup_interval_hours as i64 * HOUR_TO_MS as i64;
        let now = utc_now!();

        for status in statuses_to_clean {
            let task_ids: Vec<u64> = {
                let rw = database
                    .r_transaction()
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
                rw.scan()
                    .secondary::<JobMetaEntity>(JobMetaEntityKey::status)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .start_with(status.code())
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .filter_map(|result| match result {
                        Ok(t) if now - t.created_at > cleanup_interval_ms => Some(Ok(t.id)),
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    })
                    .try_collect()
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
            };

            let chunks: Vec<Vec<u64>> = task_ids.chunks(100).map(|chunk| chunk.to_vec()).collect();

            for chunk in chunks {
                batch_delete_impl(database, move |rw| {
                    let to_delete: Vec<JobMetaEntity> = chunk
                        .iter()
                        .filter_map(|task_id| {
                            rw.get()
                                .secondary(JobMetaEntityKey::id, *task_id)
                                .map_err(|e| {
                                    raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
                                })
                                .ok()
                                .flatten()
                        })
                        .collect();
                    Ok(to_delete)
                })
                .await?;
            }
        }

        Ok(())
    }

    pub async fn set_status(
        database: &Arc<Database<'static>>,
        task_id: u64,
        status: JobStatus,
        reason: Option<String>,
    ) -> MailFabricResult<()> {
        assert!(matches!(status, JobStatus::Removed | JobStatus::Stopped));
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<JobMetaEntity>(JobMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!(
                                "The job with id={} that you want to modify was not found.",
                                &task_id
                            ),
                            ErrorCode::JobNotFound
                        )
                    })
            },
            |current| {
                let mut updated = current.clone();
                updated.status = status;
                updated.stopped_reason = reason;
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Moves a dead-lettered job back to `Scheduled` with a fresh retry budget.
    pub async fn requeue_from_dlq(
        database: &Arc<Database<'static>>,
        task_id: u64,
    ) -> MailFabricResult<()> {
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<JobMetaEntity>(JobMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .filter(|job| job.status == JobStatus::DeadLetter)
                    .ok_or_else(|| {
                        raise_error!(
                            format!("No dead-lettered job with id={} was found.", task_id),
                            ErrorCode::JobNotFound
                        )
                    })
            },
            |current| {
                let mut updated = current.clone();
                updated.status = JobStatus::Scheduled;
                updated.retry_count = Some(0);
                updated.last_error = None;
                updated.next_run = utc_now!();
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn heartbeat(database: &Arc<Database<'static>>, task_id: u64) -> MailFabricResult<()> {
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<JobMetaEntity>(JobMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!(
                                "The job with id={} that you want to modify was not found.",
                                task_id
                            ),
                            ErrorCode::JobNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.heartbeat_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn restore(database: &Arc<Database<'static>>) -> MailFabricResult<()> {
        tracing::info!("starting job restore...");
        let running_tasks = filter_by_secondary_key_impl::<JobMetaEntity>(
            database,
            JobMetaEntityKey::status,
            JobStatus::Running.code(),
        )
        .await?;
        let rw = database
            .rw_transaction()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        for task in running_tasks {
            let mut updated = task.clone();
            if let Some(retry_count) = task.retry_count {
                if retry_count >= task.max_retries.unwrap_or(0) as usize {
                    updated.status = JobStatus::DeadLetter;
                    updated.stopped_reason = Some(
                        "Max retries exceeded, automatically dead-lettered during job restoration"
                            .into(),
                    );
                } else {
                    updated.status = JobStatus::Scheduled;
                }
            } else {
                updated.status = JobStatus::Scheduled;
            }
            updated.updated_at = utc_now!();
            rw.update(task.clone(), updated)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        }
        rw.commit()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        tracing::info!("finished job restore.");
        Ok(())
    }

    pub async fn get(database: &Arc<Database<'static>>, task_id: u64) -> MailFabricResult<Option<JobMeta>> {
        secondary_find_impl::<JobMetaEntity>(database, JobMetaEntityKey::id, task_id)
            .await
            .map(|opt| opt.map(Into::into))
    }

    pub async fn list_all(
        database: &Arc<Database<'static>>,
        task_key: &str,
    ) -> MailFabricResult<Vec<JobMetaEntity>> {
        filter_by_secondary_key_impl(database, JobMetaEntityKey::task_key, task_key.to_string()).await
    }

    pub async fn store_one(database: &Arc<Database<'static>>, task: JobMeta) -> MailFabricResult<()> {
        let entity: JobMetaEntity = task.into();
        insert_impl(database, entity).await
    }

    pub async fn store_many(
        database: &Arc<Database<'static>>,
        tasks: Vec<JobMeta>,
    ) -> MailFabricResult<()> {
        let batch: Vec<JobMetaEntity> = tasks.into_iter().map(Into::into).collect();
        batch_insert_impl(database, batch).await
    }

    pub async fn get_paginated_tasks_by_status(
        database: &Arc<Database<'static>>,
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
        task_key: &str,
        status: JobStatus,
    ) -> MailFabricResult<Paginated<JobMetaEntity>> {
        paginate_secondary_scan_impl(
            database,
            page,
            page_size,
            desc,
            JobMetaEntityKey::typed_status,
            JobMetaEntity::status_filter_key(task_key, status),
        )
        .await
    }

    pub async fn get_paginated_tasks(
        database: &Arc<Database<'static>>,
        page: Option<u64>,
        page_size: Option<u64>,
        desc: Option<bool>,
        task_key: &str,
    ) -> MailFabricResult<Paginated<JobMetaEntity>> {
        paginate_secondary_scan_impl(
            database,
            page,
            page_size,
            desc,
            JobMetaEntityKey::task_key,
            task_key.to_string(),
        )
        .await
    }

    pub async fn get_all_tasks_by_status(
        database: &Arc<Database<'static>>,
        task_key: &str,
        status: JobStatus,
    ) -> MailFabricResult<Vec<JobMetaEntity>> {
        filter_by_secondary_key_impl(
            database,
            JobMetaEntityKey::typed_status,
            JobMetaEntity::status_filter_key(task_key, status),
        )
        .await
    }
}

impl TaskStore for NativeDbTaskStore {
    async fn store_task(&self, task: JobMeta) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::store_one(&db, task).await
    }

    async fn store_tasks(&self, tasks: Vec<JobMeta>) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::store_many(&db, tasks).await
    }

    async fn fetch_pending_tasks(&self) -> MailFabricResult<Vec<JobMeta>> {
        let db = self.store.clone();
        Self::fetch_pending_tasks(&db).await
    }

    async fn update_task_execution_status(
        &self,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::update_status(
            &db,
            task_id,
            is_success,
            last_error,
            last_duration_ms,
            retry_count,
            next_run,
        )
        .await
    }

    async fn heartbeat(&self, task_id: u64) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::heartbeat(&db, task_id).await
    }

    async fn set_task_stopped(&self, task_id: u64, reason: Option<String>) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::set_status(&db, task_id, JobStatus::Stopped, reason).await
    }

    async fn cleanup(&self) -> MailFabricResult<()> {
        let db = self.store.clone();
        Self::clean_up(&db).await
    }
}
