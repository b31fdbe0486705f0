pub mod import;
pub mod init;
pub mod results;
pub mod take;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use psytest_core::parser::{load_bank_directory, parse_bank, QuestionBank};
use psytest_core::repository::DocumentRepository;
use psytest_core::traits::DocumentStore;
use psytest_store::{create_store, load_config_from, PsytestConfig};

pub type Repository = DocumentRepository<Arc<dyn DocumentStore>>;

/// Load the configuration and open the store it names.
pub fn open_repository(config_path: Option<&Path>) -> Result<(PsytestConfig, Arc<Repository>)> {
    let config = load_config_from(config_path)?;
    let store = create_store(&config.store)?;
    tracing::debug!(store = store.name(), "store opened");
    Ok((config, Arc::new(DocumentRepository::new(store))))
}

/// A single bank file, or every bank under a directory.
pub fn load_banks(path: &Path) -> Result<Vec<QuestionBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_bank(path)?])
    }
}

/// `90` -> `01:30`.
pub fn format_secs(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
