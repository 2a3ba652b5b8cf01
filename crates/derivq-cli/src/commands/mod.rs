pub mod dispatch;
pub mod keygen;
pub mod validate;

#[cfg(test)]
mod fixtures;

use std::path::Path;

use anyhow::Result;
use derivq_config::{AppConfig, loader};

use crate::observability;

/// Load and structurally validate the configuration, then hand the logging
/// level to the subscriber unless one was given on the command line.
pub(crate) fn load(path: &Path, level_override: bool) -> Result<AppConfig> {
    let config = loader::load_config(Some(&path.to_string_lossy())).map_err(anyhow::Error::msg)?;
    if !level_override {
        observability::apply_logging_level(&config.logging.level);
    }
    Ok(config)
}
