use crate::modules::context::Initialize;
use crate::modules::settings::cli::SETTINGS;
use crate::{
    modules::error::{code::ErrorCode, MailFabricResult},
    raise_error,
};
use std::path::PathBuf;
use std::sync::LazyLock;

pub const META_FILE: &str = "meta.db";
pub const JOBS_FILE: &str = "jobs.db";
pub const MAIL_FILE: &str = "mail.db";
const LOG_DIR: &str = "logs";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> =
    LazyLock::new(|| DataDirManager::new(PathBuf::from(&SETTINGS.root_dir)));

#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub meta_db: PathBuf,
    pub jobs_db: PathBuf,
    pub mail_db: PathBuf,
    pub log_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> MailFabricResult<()> {
        std::fs::create_dir_all(&DATA_DIR_MANAGER.root_dir)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        std::fs::create_dir_all(&DATA_DIR_MANAGER.log_dir)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir: root_dir.clone(),
            meta_db: root_dir.join(META_FILE),
            jobs_db: root_dir.join(JOBS_FILE),
            mail_db: root_dir.join(MAIL_FILE),
            log_dir: root_dir.join(LOG_DIR),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_derives_every_db_path_under_root() {
        let temp_dir = tempdir().unwrap();
        let manager = DataDirManager::new(temp_dir.path().to_path_buf());

        assert_eq!(manager.meta_db, temp_dir.path().join(META_FILE));
        assert_eq!(manager.jobs_db, temp_dir.path().join(JOBS_FILE));
        assert_eq!(manager.mail_db, temp_dir.path().join(MAIL_FILE));
        assert_eq!(manager.log_dir, temp_dir.path().join(LOG_DIR));
    }
}
