//! Typed error enum for the browser crate.

use std::time::Duration;

use redmine_sweep_core::SweepError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("element not found: {0}")]
    MissingElement(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("page did not settle within {0:?}")]
    Timeout(Duration),
    #[error("login failed: {0}")]
    Login(String),
}

impl BrowserError {
    /// Whether the failed operation is worth repeating on the same page.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::MissingElement(_) | Self::Navigation { .. } | Self::Timeout(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<BrowserError> for SweepError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Login(reason) => Self::Authentication(reason),
            other => Self::Browser(other.to_string()),
        }
    }
}
