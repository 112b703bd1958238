//! Subcommand implementations.

pub mod apply;
pub mod beliefs;
pub mod ingest;
pub mod scan;
pub mod status;

use std::path::Path;
use std::sync::Arc;
use worldview_config::AppConfig;
use worldview_store::SqliteStore;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

pub async fn open_store(config: &AppConfig) -> CliResult<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.store.db_path).await?;
    Ok(Arc::new(store))
}

/// Read a JSON payload from a file, or stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> CliResult<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
