//! Core types and policies for redmine-sweep
//!
//! This crate contains the domain types, error taxonomy, retry policy and
//! filename handling shared by the client, browser and service crates.

pub mod cancel;
mod config;
mod counters;
pub mod env_config;
mod error;
mod outcome;
pub mod retry;
pub mod sanitize;
mod ticket;
mod traits;

pub use cancel::{CancellationSignal, is_cancelled, sleep_or_cancel};
pub use config::*;
pub use counters::*;
pub use error::*;
pub use outcome::*;
pub use retry::{Attempt, AttemptFailure, RetryError, RetryPolicy};
pub use ticket::*;
pub use traits::*;
