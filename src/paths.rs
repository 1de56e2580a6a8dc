use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "aniplay";

pub fn database_file_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join(APP_DIR).join("history.db"))
}

pub fn settings_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join(APP_DIR).join("settings.toml"))
}
