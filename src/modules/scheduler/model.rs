use crate::{
    id,
    modules::scheduler::retry::{RetryPolicy, RetryStrategy},
    utc_now,
};
use serde::{Deserialize, Serialize};
use std::fmt;

type LinearInterval = u32;
type ExponentialBase = u32;

/// A persisted job: everything the queue needs to schedule, retry and report
/// on one unit of work, independent of the job family that produced it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub id: u64,
    pub task_key: String,
    pub task_params: String,
    pub queue_name: String,
    pub updated_at: i64,
    pub status: JobStatus,
    pub stopped_reason: Option<String>,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<usize>,
    pub retry_count: Option<usize>,
    pub next_run: i64,
    pub retry_strategy: Retry,
    pub retry_interval: u32,
    pub base_interval: u32,
    pub delay_seconds: u32,
    pub max_retries: Option<u32>,
    pub heartbeat_at: i64,
    pub created_at: i64,
    /// Tags this job as belonging to its family's companion priority stream;
    /// the flow drains these ahead of the family's normal backlog.
    pub is_priority: bool,
}

/// Lifecycle states a job moves through from enqueue to terminal outcome.
/// `DeadLetter` is reached once `retry_count` exceeds `max_retries`; jobs in
/// this state are parked for `requeue_from_dlq` rather than retried automatically.
#[derive(Clone, Debug, Eq, Default, PartialEq, Serialize, Deserialize, Hash)]
pub enum JobStatus {
    #[default]
    Scheduled,
    Running,
    Success,
    Failed,
    DeadLetter,
    Removed,
    Stopped,
}

impl JobStatus {
    pub fn code(&self) -> u32 {
        match &self {
            JobStatus::Scheduled => 1,
            JobStatus::Running => 2,
            JobStatus::Success => 3,
            JobStatus::Failed => 4,
            JobStatus::DeadLetter => 5,
            JobStatus::Removed => 6,
            JobStatus::Stopped => 7,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            JobStatus::Scheduled => "Scheduled",
            JobStatus::Running => "Running",
            JobStatus::Success => "Success",
            JobStatus::Failed => "Failed",
            JobStatus::DeadLetter => "DeadLetter",
            JobStatus::Removed => "Removed",
            JobStatus::Stopped => "Stopped",
        };
        write!(f, "{}", status_str)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Retry {
    #[default]
    Linear,
    Exponential,
}

impl fmt::Display for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retry::Linear => write!(f, "Linear"),
            Retry::Exponential => write!(f, "Exponential"),
        }
    }
}

fn to_retry(retry_policy: RetryPolicy) -> (Retry, LinearInterval, ExponentialBase) {
    match retry_policy.strategy {
        RetryStrategy::Linear { interval } => (Retry::Linear, interval, Default::default()),
        RetryStrategy::Exponential { base } => (Retry::Exponential, Default::default(), base),
    }
}

impl JobMeta {
    pub fn new(
        task_key: String,
        task_params: String,
        queue_name: String,
        retry_policy: RetryPolicy,
        delay_seconds: u32,
        is_priority: bool,
    ) -> Self {
        let (retry_strategy, retry_interval, base_interval) = to_retry(retry_policy);
        Self {
            id: id!(96),
            task_key,
            task_params,
            queue_name,
            updated_at: utc_now!(),
            status: JobStatus::Scheduled,
            last_error: Default::default(),
            last_duration_ms: Default::default(),
            retry_count: Default::default(),
            next_run: Default::default(),
            stopped_reason: Default::default(),
            retry_strategy,
            retry_interval,
            base_interval,
            max_retries: retry_policy.max_retries,
            heartbeat_at: Default::default(),
            delay_seconds,
            created_at: utc_now!(),
            is_priority,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let strategy = match self.retry_strategy {
            Retry::Linear => RetryStrategy::Linear {
                interval: self.retry_interval,
            },
            Retry::Exponential => RetryStrategy::Exponential {
                base: self.base_interval,
            },
        };

        RetryPolicy {
            strategy,
            max_retries: self.max_retries,
        }
    }
}
