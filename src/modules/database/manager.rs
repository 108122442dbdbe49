// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

use crate::modules::context::Initialize;
use crate::modules::database::META_MODELS;
use crate::modules::error::{code::ErrorCode, MailFabricError, MailFabricResult};
use crate::modules::repository::entities::mail::MAIL_MODELS;
use crate::modules::scheduler::nativedb::JOB_MODELS;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use native_db::{Builder, Database};
use std::sync::{Arc, LazyLock};
use tracing::info;

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

pub struct DatabaseManager {
    /// Connections, sync state, modifiers, classification rules, webhooks, notifications.
    meta_db: Arc<Database<'static>>,
    /// Durable job queue.
    jobs_db: Arc<Database<'static>>,
    /// Mail metadata, bodies, threads, attachments, versions.
    mail_db: Arc<Database<'static>>,
}

impl DatabaseManager {
    fn new() -> Self {
        let meta_db = Self::init_meta_database().expect("Failed to initialize metadata database");
        let jobs_db = Self::init_jobs_database().expect("Failed to initialize jobs database");
        let mail_db = Self::init_mail_database().expect("Failed to initialize mail database");
        DatabaseManager {
            meta_db,
            jobs_db,
            mail_db,
        }
    }

    pub fn meta_db(&self) -> &Arc<Database<'static>> {
        &self.meta_db
    }

    pub fn jobs_db(&self) -> &Arc<Database<'static>> {
        &self.jobs_db
    }

    pub fn mail_db(&self) -> &Arc<Database<'static>> {
        &self.mail_db
    }

    fn init_meta_database() -> MailFabricResult<Arc<Database<'static>>> {
        info!("Initializing metadata database at: {:?}", &DATA_DIR_MANAGER.meta_db);
        let mut database = Builder::new()
            .set_cache_size(SETTINGS.metadata_cache_size.unwrap_or(134217728).max(67108864)) //default 128MB
            .create(&META_MODELS, DATA_DIR_MANAGER.meta_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn init_jobs_database() -> MailFabricResult<Arc<Database<'static>>> {
        info!("Initializing jobs database at: {:?}", &DATA_DIR_MANAGER.jobs_db);
        let mut database = Builder::new()
            .set_cache_size(SETTINGS.job_queue_cache_size.unwrap_or(134217728).max(67108864)) //default 128MB
            .create(&JOB_MODELS, DATA_DIR_MANAGER.jobs_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn init_mail_database() -> MailFabricResult<Arc<Database<'static>>> {
        info!("Initializing mail database at: {:?}", &DATA_DIR_MANAGER.mail_db);
        let mut database = Builder::new()
            .set_cache_size(SETTINGS.mail_cache_size.unwrap_or(1073741824).max(67108864)) //default 1GB
            .create(&MAIL_MODELS, DATA_DIR_MANAGER.mail_db.clone())
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn handle_database_error(error: native_db::db_type::Error) -> MailFabricError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "Database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("Database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("Failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> MailFabricResult<()> {
        LazyLock::force(&DB_MANAGER);
        Ok(())
    }
}
