// ytvm-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

/// Exit status used for every provisioning or launch failure.
pub const FAILURE_EXIT_CODE: i32 = 1;
/// Exit status used when SIGINT interrupts provisioning (128 + 2).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
/// Exit status used when SIGTERM interrupts provisioning (128 + 15).
pub const TERMINATED_EXIT_CODE: i32 = 143;

#[derive(Error, Debug, Clone)]
pub enum YtvmError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Unsupported platform/arch: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Too many redirects ({hops}) while fetching {url}")]
    TooManyRedirects { url: String, hops: usize },

    #[error("Redirect cycle detected at {0}")]
    RedirectCycle(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("Extraction Error: {0}")]
    ExtractionError(String),

    #[error("Could not find extracted binary {name} in archive {asset}")]
    BinaryNotFound { name: String, asset: String },

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Failed to launch {0}")]
    LaunchError(String),

    #[error("Interrupted by {0}")]
    Interrupted(String),
}

impl YtvmError {
    /// Process exit status the launcher reports for this failure. Interrupts
    /// follow the same `128 + signal` convention as signalled children.
    pub fn exit_code(&self) -> i32 {
        match self {
            YtvmError::Interrupted(signal) if signal == "SIGTERM" => TERMINATED_EXIT_CODE,
            YtvmError::Interrupted(_) => INTERRUPTED_EXIT_CODE,
            _ => FAILURE_EXIT_CODE,
        }
    }
}

impl From<std::io::Error> for YtvmError {
    fn from(err: std::io::Error) -> Self {
        YtvmError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for YtvmError {
    fn from(err: reqwest::Error) -> Self {
        YtvmError::Http(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, YtvmError>;
