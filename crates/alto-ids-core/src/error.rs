use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Backup of {} failed: {message}", path.display())]
    Backup { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn backup(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Backup {
            path: path.into(),
            message: message.into(),
        }
    }
}
