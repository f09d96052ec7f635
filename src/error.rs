//! Error types for rtunnel.

use thiserror::Error;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal exit (signal-driven shutdown)
    Success = 0,
    /// Unclassified failure
    Failure = 1,
    /// Invalid configuration
    ConfigInvalid = 2,
    /// Listen failed
    ListenFailed = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for rtunnel.
#[derive(Debug, Error)]
pub enum Error {
    #[error("listen failed: {0}")]
    ListenFailed(String),

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::ListenFailed(_) => ExitCode::ListenFailed,
            Error::Config(_) => ExitCode::ConfigInvalid,
            Error::ConnectFailed(_) | Error::ConnectTimeout(_) | Error::Io(_) => ExitCode::Failure,
        }
    }
}

/// Result type alias for rtunnel operations.
pub type Result<T> = std::result::Result<T, Error>;
