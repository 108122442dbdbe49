use crate::logger::file::setup_file_logger;
use crate::modules::settings::cli::SETTINGS;
use chrono::Local;
use std::process;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod file;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub fn initialize_logging() {
    if SETTINGS.log_to_file {
        setup_file_logger().unwrap();
    } else {
        setup_stdout_logger().unwrap();
    }
}

fn setup_stdout_logger() -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
    validate_log_level(&SETTINGS.log_level);
    let level = SETTINGS.log_level.parse::<Level>().unwrap();
    let with_ansi = SETTINGS.ansi_logs;

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(with_ansi)
        .with_writer(std::io::stdout)
        .with_level(true)
        .with_target(true)
        .with_timer(LocalTimer);

    if SETTINGS.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

fn validate_log_level(value: &String) {
    if value.parse::<Level>().is_err() {
        eprintln!(
            "Invalid log level specified. Use one of: error, warn, info, debug, trace.
        The log level you currently specified is 'log_level'='{}'",
            value
        );
        process::exit(1);
    }
}
