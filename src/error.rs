use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcmeError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {record} record: {reason}")]
    MalformedRecord { record: &'static str, reason: String },

    #[error("Short read on {record}: expected at least {expected} bytes, got {actual}")]
    ShortRead {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Event stream desynchronized: {0}")]
    ProtocolDesync(String),

    #[error("Invalid use: {0}")]
    CallerMisuse(String),

    #[error("Window {0} not found")]
    WindowNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Cannot locate namespace: {0}")]
    Namespace(String),
}

impl AcmeError {
    pub(crate) fn open(path: impl Into<String>, source: std::io::Error) -> Self {
        AcmeError::Open {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(path: impl Into<String>, source: std::io::Error) -> Self {
        AcmeError::Transport {
            path: path.into(),
            source,
        }
    }

    /// True for failures that came from the transport rather than from
    /// decoding or local validation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AcmeError::Open { .. } | AcmeError::Transport { .. } | AcmeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AcmeError>;
