use clap::{builder::ValueParser, Parser};
use std::{path::PathBuf, sync::LazyLock};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailfabric",
    about = "Background worker fabric for multi-account mail sync, job scheduling and AI classification.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// Log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level")]
    pub log_level: String,

    /// Enable ANSI colored logs
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub ansi_logs: bool,

    /// Log to a rolling file instead of stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub log_to_file: bool,

    /// Emit structured JSON logs
    #[clap(long, default_value = "false", env, help = "Enable JSON formatted logs")]
    pub json_logs: bool,

    /// Maximum number of rotated log files kept
    #[clap(long, default_value = "5", env, help = "Maximum number of log files to retain")]
    pub max_log_files: usize,

    /// Encryption password used to protect OAuth tokens at rest
    #[clap(
        long,
        default_value = "change-this-default-password-now",
        env,
        help = "Encryption password for credentials at rest. Change this default in production!"
    )]
    pub encrypt_password: String,

    #[clap(
        long,
        env,
        help = "Root directory for the embedded databases and logs",
        value_parser = ValueParser::new(|s: &str| {
            let path = PathBuf::from(s);
            if !path.is_absolute() {
                return Err("Path must be an absolute directory path".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub root_dir: String,

    #[clap(long, env, default_value = "134217728", help = "Cache size for the metadata database, in bytes")]
    pub metadata_cache_size: usize,

    #[clap(long, env, default_value = "67108864", help = "Cache size for the job queue database, in bytes")]
    pub job_queue_cache_size: usize,

    #[clap(long, env, default_value = "536870912", help = "Cache size for the mail-metadata database, in bytes")]
    pub mail_cache_size: usize,

    #[clap(
        long,
        env,
        default_value = "72",
        help = "Interval in hours between terminal-job cleanup sweeps",
        value_parser = clap::value_parser!(u64).range(1..=720)
    )]
    pub cleanup_interval_hours: u64,

    #[clap(
        long,
        help = "Directory for periodic database snapshots (must exist, read/write)"
    )]
    pub backup_dir: Option<PathBuf>,

    #[clap(long, default_value = "10", help = "Maximum number of retained snapshots per database file")]
    pub max_backups: usize,

    #[clap(
        long,
        env,
        default_value = "900",
        help = "Interval in seconds between metadata snapshot writes (minimum 60)",
        value_parser = clap::value_parser!(u64).range(60..)
    )]
    pub metadata_snapshot_interval_secs: u64,

    /// Bounded fan-out when fetching a page of messages from a provider.
    #[clap(long, env, default_value = "10", value_parser = clap::value_parser!(u16).range(1..=10))]
    pub page_fetch_concurrency: u16,

    /// Per job family worker pool size; the `.priority` lane gets its own pool of the same size.
    #[clap(long, env, default_value = "8", help = "Number of consumers per job-queue stream")]
    pub queue_workers_per_family: usize,

    /// Weighted fair scheduling ratio of priority-lane polls to normal-lane polls.
    #[clap(long, env, default_value = "4")]
    pub priority_lane_weight: u32,

    #[clap(long, env, default_value = "5", help = "Max retry attempts before a job is dead-lettered")]
    pub max_job_retries: u32,

    #[clap(long, env, default_value = "2000", help = "Base retry backoff in milliseconds")]
    pub retry_base_ms: u64,

    #[clap(long, env, default_value = "300000", help = "Retry backoff cap in milliseconds (5 min)")]
    pub retry_cap_ms: u64,

    /// Gap-repair freshness bound, in minutes.
    #[clap(long, env, default_value = "30")]
    pub gap_repair_freshness_minutes: u64,

    /// Webhook subscriptions are renewed when within this many hours of expiry.
    #[clap(long, env, default_value = "24")]
    pub webhook_renew_window_hours: i64,

    /// The push target handed to providers when creating a watch/subscription:
    /// a pubsub topic for Gmail, an HTTPS callback URL for Graph.
    #[clap(long, env, default_value = "")]
    pub webhook_callback_url: String,

    /// Mail body cache TTL in days.
    #[clap(long, env, default_value = "90")]
    pub body_cache_ttl_days: i64,

    /// Modifier cleanup age in days.
    #[clap(long, env, default_value = "7")]
    pub modifier_cleanup_age_days: i64,

    /// AI batch size for classification requests.
    #[clap(long, env, default_value = "10")]
    pub ai_batch_size: usize,

    /// AI batch window in milliseconds before flushing a partial batch.
    #[clap(long, env, default_value = "2000")]
    pub ai_batch_window_ms: u64,

    /// Bounded concurrency for in-flight LLM calls.
    #[clap(long, env, default_value = "5")]
    pub ai_concurrency: usize,

    /// Provider call timeout in seconds.
    #[clap(long, env, default_value = "30")]
    pub provider_timeout_secs: u64,

    #[clap(long, env, default_value = "120")]
    pub llm_timeout_secs: u64,

    #[clap(long, env, default_value = "60")]
    pub gmail_batch_timeout_secs: u64,

    /// OpenAI-compatible API key for the AI Orchestrator's LLM client.
    #[clap(long, env)]
    pub openai_api_key: Option<String>,

    #[clap(long, env, default_value = "gpt-4o-mini")]
    pub openai_model: String,
}

impl Settings {
    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi_logs: false,
            log_to_file: false,
            json_logs: false,
            max_log_files: 5,
            encrypt_password: "change-this-default-password-now".into(),
            root_dir: if cfg!(windows) {
                "C:\\mailfabric_data".into()
            } else {
                "/tmp/mailfabric_data".into()
            },
            metadata_cache_size: 134_217_728,
            job_queue_cache_size: 67_108_864,
            mail_cache_size: 536_870_912,
            cleanup_interval_hours: 72,
            backup_dir: None,
            max_backups: 10,
            metadata_snapshot_interval_secs: 900,
            page_fetch_concurrency: 10,
            queue_workers_per_family: 4,
            priority_lane_weight: 4,
            max_job_retries: 5,
            retry_base_ms: 2000,
            retry_cap_ms: 300_000,
            gap_repair_freshness_minutes: 30,
            webhook_renew_window_hours: 24,
            webhook_callback_url: "https://example.invalid/webhooks/mail".into(),
            body_cache_ttl_days: 90,
            modifier_cleanup_age_days: 7,
            ai_batch_size: 10,
            ai_batch_window_ms: 2000,
            ai_concurrency: 5,
            provider_timeout_secs: 30,
            llm_timeout_secs: 120,
            gmail_batch_timeout_secs: 60,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
        }
    }
}
