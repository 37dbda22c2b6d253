//! `questsync config`: print the effective configuration.

use std::path::PathBuf;

use questsync::config::SyncConfig;

use crate::error::CliError;

/// Explicit path, or the platform default.
pub fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    path.or_else(SyncConfig::default_path)
        .ok_or(CliError::NoConfigDir)
}

/// Load the configuration, optionally writing defaults first.
pub fn run(path: Option<PathBuf>, init: bool) -> Result<(), CliError> {
    let path = resolve_path(path)?;
    let config = SyncConfig::load_or_default(&path)?;

    if init && !path.exists() {
        config.save(&path)?;
        println!("Wrote default configuration to {}", path.display());
    }

    let source = if path.exists() { "file" } else { "defaults" };
    println!("# {} ({})", path.display(), source);
    print!("{}", config.to_ini_string()?);
    Ok(())
}
