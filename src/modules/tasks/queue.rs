// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

//! The process-wide handle onto the durable job queue: one [`TaskContext`]
//! registered with every job family this core runs, started once at boot.

use crate::modules::ai::{AIClassifyBatchJob, AIClassifyJob, AI_CLASSIFY_BATCH_QUEUE, AI_CLASSIFY_QUEUE};
use crate::modules::context::Initialize;
use crate::modules::database::manager::DB_MANAGER;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailFabricResult;
use crate::modules::scheduler::context::TaskContext;
use crate::modules::scheduler::nativedb::meta::NativeDbTaskStore;
use crate::modules::scheduler::task::Task;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::sync::{MailSyncIncrementalJob, MailSyncInitJob, MailSyncPageJob, MAIL_SYNC_QUEUE};
use crate::raise_error;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

static JOB_QUEUE: OnceLock<MailFabricJobQueue> = OnceLock::new();

pub struct MailFabricJobQueue {
    task_context: Arc<RwLock<TaskContext<NativeDbTaskStore>>>,
}

impl Initialize for MailFabricJobQueue {
    async fn initialize() -> MailFabricResult<()> {
        let queue = MailFabricJobQueue::new().await;
        let _ = JOB_QUEUE.set(queue);
        Ok(())
    }
}

impl MailFabricJobQueue {
    pub fn get() -> MailFabricResult<&'static MailFabricJobQueue> {
        JOB_QUEUE
            .get()
            .ok_or_else(|| raise_error!("job queue not initialized".into(), ErrorCode::InternalError))
    }

    async fn new() -> Self {
        let store = Arc::new(NativeDbTaskStore::init(DB_MANAGER.jobs_db().clone()));
        NativeDbTaskStore::restore(DB_MANAGER.jobs_db())
            .await
            .expect("failed to restore jobs from the scheduler metadata database");

        let task_context = TaskContext::with_arc_store(store)
            .register::<MailSyncInitJob>()
            .register::<MailSyncPageJob>()
            .register::<MailSyncIncrementalJob>()
            .register::<AIClassifyJob>()
            .register::<AIClassifyBatchJob>()
            .set_concurrency(MAIL_SYNC_QUEUE, SETTINGS.queue_workers_per_family)
            .set_concurrency(AI_CLASSIFY_QUEUE, SETTINGS.ai_concurrency)
            .set_concurrency(AI_CLASSIFY_BATCH_QUEUE, SETTINGS.queue_workers_per_family)
            .start_with_cleaner()
            .await;

        MailFabricJobQueue {
            task_context: Arc::new(RwLock::new(task_context)),
        }
    }

    pub async fn submit<T>(&self, task: T, delay_seconds: Option<u32>) -> MailFabricResult<()>
    where
        T: Task + Send + Sync + 'static,
    {
        let context = self.task_context.read().await;
        context
            .add_task(task, delay_seconds)
            .await
            .map_err(|message| raise_error!(message, ErrorCode::InternalError))
    }

    pub async fn submit_many<T>(&self, tasks: &[T], delay_seconds: Option<u32>) -> MailFabricResult<()>
    where
        T: Task + Send + Sync + 'static,
    {
        let context = self.task_context.read().await;
        context
            .add_tasks(tasks, delay_seconds)
            .await
            .map_err(|message| raise_error!(message, ErrorCode::InternalError))
    }

    pub async fn stop(&self, task_id: u64, reason: Option<String>) -> MailFabricResult<()> {
        let context = self.task_context.read().await;
        context
            .stop_task(task_id, reason)
            .await
            .map_err(|message| raise_error!(message, ErrorCode::InternalError))
    }
}
