use std::sync::LazyLock;

use crate::{
    modules::{context::Initialize, error::MailFabricResult},
    utc_now,
};
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec, Gauge, GaugeVec, HistogramVec, IntCounterVec, IntGaugeVec,
};

pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";

pub const GMAIL: &str = "gmail";
pub const GRAPH: &str = "graph";
pub const OPENAI: &str = "openai";

pub const METRIC_BUILD_INFO: &str = "mailfabric_build_info";
pub const METRIC_START_TIMESTAMP: &str = "mailfabric_start_timestamp";
pub const METRIC_JOB_QUEUE_LENGTH: &str = "mailfabric_job_queue_length";
pub const METRIC_JOB_FETCH_DURATION: &str = "mailfabric_job_fetch_duration_seconds";
pub const METRIC_JOB_RUN_DURATION: &str = "mailfabric_job_run_duration_seconds_by_family_status";
pub const METRIC_PROVIDER_CALL_TOTAL: &str = "mailfabric_provider_call_total";
pub const METRIC_PROVIDER_CALL_DURATION: &str = "mailfabric_provider_call_duration_seconds";
pub const METRIC_AI_CLASSIFY_DURATION: &str = "mailfabric_ai_classify_duration_seconds";
pub const METRIC_AI_CACHE_HIT_TOTAL: &str = "mailfabric_ai_cache_hit_total";
pub const METRIC_SYNC_LAG_SECONDS: &str = "mailfabric_sync_lag_seconds";
pub const METRIC_WEBHOOK_RENEWAL_TOTAL: &str = "mailfabric_webhook_renewal_total";
pub const METRIC_MODIFIER_QUEUE_DEPTH: &str = "mailfabric_modifier_queue_depth";

pub static MAILFABRIC_BUILD_INFO: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec!(
        METRIC_BUILD_INFO,
        "Build information including version and commit hash",
        &["version", "commit"]
    )
    .expect("Failed to register mailfabric_build_info")
});

pub static MAILFABRIC_START_TIMESTAMP: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        METRIC_START_TIMESTAMP,
        "Unix timestamp when mailfabric started"
    )
    .expect("Failed to register mailfabric_start_timestamp")
});

/// Current length of each job-queue stream, e.g. "mail.sync", "ai.classify.priority".
pub static MAILFABRIC_JOB_QUEUE_LENGTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        METRIC_JOB_QUEUE_LENGTH,
        "Current length of job queues by stream",
        &["queue"]
    )
    .expect("Failed to register mailfabric_job_queue_length")
});

pub static MAILFABRIC_JOB_FETCH_DURATION: LazyLock<prometheus::Histogram> = LazyLock::new(|| {
    prometheus::register_histogram!(
        METRIC_JOB_FETCH_DURATION,
        "Duration of fetching pending jobs from the store, measured in seconds"
    )
    .expect("Failed to register mailfabric_job_fetch_duration_seconds")
});

pub static MAILFABRIC_JOB_RUN_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        METRIC_JOB_RUN_DURATION,
        "Job execution duration in seconds, grouped by job family and outcome",
        &["family", "status"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register mailfabric_job_run_duration_seconds_by_family_status")
});

pub static MAILFABRIC_PROVIDER_CALL_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_PROVIDER_CALL_TOTAL,
        "Total provider API calls, grouped by provider and outcome",
        &["provider", "status"]
    )
    .expect("Failed to register mailfabric_provider_call_total")
});

pub static MAILFABRIC_PROVIDER_CALL_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        METRIC_PROVIDER_CALL_DURATION,
        "Provider API call duration in seconds, grouped by provider",
        &["provider"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register mailfabric_provider_call_duration_seconds")
});

pub static MAILFABRIC_AI_CLASSIFY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        METRIC_AI_CLASSIFY_DURATION,
        "AI classification pipeline duration in seconds, grouped by stage",
        &["stage"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register mailfabric_ai_classify_duration_seconds")
});

pub static MAILFABRIC_AI_CACHE_HIT_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_AI_CACHE_HIT_TOTAL,
        "Total L1 fingerprint cache lookups for AI results, grouped by hit/miss",
        &["outcome"]
    )
    .expect("Failed to register mailfabric_ai_cache_hit_total")
});

pub static MAILFABRIC_SYNC_LAG_SECONDS: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec!(
        METRIC_SYNC_LAG_SECONDS,
        "Seconds since a connection's sync cursor was last advanced",
        &["connection_id"]
    )
    .expect("Failed to register mailfabric_sync_lag_seconds")
});

pub static MAILFABRIC_WEBHOOK_RENEWAL_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        METRIC_WEBHOOK_RENEWAL_TOTAL,
        "Total webhook subscription renewal attempts, grouped by outcome",
        &["status"]
    )
    .expect("Failed to register mailfabric_webhook_renewal_total")
});

pub static MAILFABRIC_MODIFIER_QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        METRIC_MODIFIER_QUEUE_DEPTH,
        "Current depth of the offline-first modifier queue, by connection",
        &["connection_id"]
    )
    .expect("Failed to register mailfabric_modifier_queue_depth")
});

pub struct MetricsService;

impl Initialize for MetricsService {
    async fn initialize() -> MailFabricResult<()> {
        let now = utc_now!();
        MAILFABRIC_START_TIMESTAMP.set(now as f64);
        let version = env!("CARGO_PKG_VERSION");
        let commit = env!("GIT_HASH");
        MAILFABRIC_BUILD_INFO
            .with_label_values(&[version, commit])
            .set(1.0);
        Ok(())
    }
}
