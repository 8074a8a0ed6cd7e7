//! Parameters handed from one setup stage to the next, one plain-text file
//! per parameter.

use crate::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = "../config";

/// Writes `value` to `<config_dir>/<name>`, creating the directory first if
/// needed. Returns the written path.
pub fn write_param(name: &str, value: &str, config_dir: impl AsRef<Path>) -> Option<PathBuf> {
    match try_write_param(name, value, config_dir.as_ref()) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::error!("write_param, failed to write {}: {}", name, e);
            None
        }
    }
}

fn try_write_param(name: &str, value: &str, config_dir: &Path) -> Result<PathBuf, InfraError> {
    if !config_dir.is_dir() {
        tracing::warn!(
            "write_param, {} does not exist, creating it now",
            config_dir.display()
        );
        fs::create_dir_all(config_dir)?;
    }
    let path = config_dir.join(name);
    tracing::info!(
        "write_param, fpath={}, writing {}={}",
        path.display(),
        name,
        value
    );
    fs::write(&path, value)?;
    Ok(path)
}

/// `None` when the parameter was never written.
pub fn read_param(name: &str, config_dir: impl AsRef<Path>) -> Option<String> {
    let path = config_dir.as_ref().join(name);
    if !path.is_file() {
        return None;
    }
    match fs::read_to_string(&path) {
        Ok(value) => {
            tracing::info!(
                "read_param, fpath={}, read {}={}",
                path.display(),
                name,
                value
            );
            Some(value)
        }
        Err(e) => {
            tracing::error!("read_param, failed to read {}: {}", path.display(), e);
            None
        }
    }
}
