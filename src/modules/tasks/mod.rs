// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::ai::cache::AICacheCleanupTask;
use crate::modules::context::RustMailTask;
use crate::modules::database::backup::task::DatabaseBackupTask;
use crate::modules::modifier::{ModifierCleanupTask, ModifierWorker};
use crate::modules::sync::{GapRepairTask, MailBodyCleanupTask};
use crate::modules::webhook::WebhookRenewalTask;

pub mod queue;

pub struct PeriodicTasks;

impl PeriodicTasks {
    pub fn start_background_tasks() {
        DatabaseBackupTask::start();
        ModifierWorker::start();
        ModifierCleanupTask::start();
        GapRepairTask::start();
        WebhookRenewalTask::start();
        AICacheCleanupTask::start();
        MailBodyCleanupTask::start();
    }
}
