//! CLI error type.

use std::path::PathBuf;

use questsync::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no configuration directory on this platform, pass --path")]
    NoConfigDir,

    #[error("failed to read script {path}: {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Script {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
