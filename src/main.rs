use mimalloc::MiMalloc;
use modules::{
    context::{executors::FabricRuntime, Initialize},
    error::MailFabricResult,
    logger,
    settings::dir::DataDirManager,
    tasks::{queue::MailFabricJobQueue, PeriodicTasks},
};
use tracing::info;

use crate::modules::{
    common::signal::SignalManager, database::manager::DatabaseManager, metrics::MetricsService,
};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  __  __       _ _ ____    _     _
 |  \/  | __ _(_) | __ )  (_) __| |
 | |\/| |/ _` | | |  _ \  | |/ _` |
 | |  | | (_| | | | |_) | | | (_| |
 |_|  |_|\__,_|_|_|____/ _/ |\__,_|
                        |__/
"#;

#[tokio::main]
async fn main() -> MailFabricResult<()> {
    logger::initialize_logging();
    info!("{}", LOGO);
    info!("Starting mailfabric");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    // Nothing left to await here: all work runs on the job queue and the
    // periodic tasks, both spawned by `initialize`. Park the main task so
    // the process stays up until a signal brings it down.
    std::future::pending::<()>().await;
    Ok(())
}

/// Brings up the embedded databases, the job queue and every periodic task,
/// then kicks off a sync pass for connections already on record.
async fn initialize() -> MailFabricResult<()> {
    SignalManager::initialize().await?;
    DataDirManager::initialize().await?;
    MetricsService::initialize().await?;
    DatabaseManager::initialize().await?;
    MailFabricJobQueue::initialize().await?;
    FabricRuntime::initialize().await?;
    PeriodicTasks::start_background_tasks();
    Ok(())
}
