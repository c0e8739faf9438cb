use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// The handful of page operations the delete workflow needs.
///
/// One implementation drives a real browser over CDP; tests script a fake.
/// Confirmation dialogs are accepted by the implementation as they appear,
/// so callers only click.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until any pending navigation has finished and the document is
    /// complete.
    async fn wait_for_settle(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the value of the first input matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Number of elements matching `selector`; zero when none match.
    async fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;
}
