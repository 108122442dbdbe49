// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::{error::MailFabricResult, scheduler::model::JobMeta};
use std::future::Future;

pub trait TaskStore {
    fn store_task(&self, task: JobMeta) -> impl Future<Output = MailFabricResult<()>> + Send;

    fn store_tasks(
        &self,
        tasks: Vec<JobMeta>,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;

    fn fetch_pending_tasks(&self) -> impl Future<Output = MailFabricResult<Vec<JobMeta>>> + Send;

    fn update_task_execution_status(
        &self,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;

    fn heartbeat(&self, task_id: u64) -> impl Future<Output = MailFabricResult<()>> + Send;

    fn set_task_stopped(
        &self,
        task_id: u64,
        reason: Option<String>,
    ) -> impl Future<Output = MailFabricResult<()>> + Send;

    fn cleanup(&self) -> impl Future<Output = MailFabricResult<()>> + Send;
}
