use std::io;
use std::result::Result as StdResult;

use thiserror::Error;

/// Run-level errors for redmine-sweep.
///
/// Per-item failures (one download, one attachment delete) are not errors at
/// this level: they are aggregated into outcomes. These variants are the ones
/// that stop a run or a stage of it.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Required credential or URL missing, or a setting has an invalid value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A list or content request exhausted its retries.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Browser login failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Browser session could not be driven (launch, protocol, navigation).
    #[error("browser error: {0}")]
    Browser(String),

    /// Interactive confirmation declined or the run was interrupted.
    #[error("cancelled by user")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SweepError {
    /// Whether this error is a user cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = StdResult<T, SweepError>;
