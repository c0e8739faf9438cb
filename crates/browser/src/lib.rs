//! Browser-driven attachment deletion for redmine-sweep
//!
//! The REST API has no endpoint for removing attachments, so deletes go
//! through the web UI: log in, open each ticket, click every delete control.

mod chromium;
mod deleter;
pub mod error;
mod page;


pub use chromium::{ChromiumPage, ChromiumSession};
pub use deleter::{ATTACHMENTS_SECTION, BrowserDeleteClient, DELETE_CONTROL, LOGIN_PATH};
pub use error::BrowserError;
pub use page::BrowserPage;
