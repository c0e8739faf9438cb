//! Redmine REST client for redmine-sweep
//!
//! Lists tickets page by page (with attachments, across every status) and
//! downloads attachment content, both under the configured retry policy.

mod client;
mod download;
pub mod error;

#[cfg(test)]
mod download_tests;

pub use client::{ANY_STATUS, API_KEY_HEADER, RedmineClient, truncate};
pub use error::ClientError;
