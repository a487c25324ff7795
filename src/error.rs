// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("malformed measurement table {path}: {message}")]
    Table { path: PathBuf, message: String },

    #[error("unreadable test report {path}: {message}")]
    Report { path: PathBuf, message: String },

    #[error("no data collected for target {0}")]
    NoData(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
