//! Chrome DevTools Protocol adapter for [`BrowserPage`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use redmine_sweep_core::{AuthMethod, BrowserSettings};
use tokio::task::JoinHandle;

use crate::error::BrowserError;
use crate::page::BrowserPage;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the browser process and its background tasks. The page handed out by
/// [`ChromiumSession::launch`] stays usable until [`ChromiumSession::close`].
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    dialogs: JoinHandle<()>,
}

/// One tab of a [`ChromiumSession`].
#[derive(Clone)]
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumSession {
    /// Launches the browser and opens the single page of the run.
    ///
    /// With [`AuthMethod::Basic`] an `Authorization` header is attached to
    /// every request of the page, so no login form is needed.
    ///
    /// # Errors
    /// Returns [`BrowserError::Launch`] if no browser can be started, or a
    /// protocol error if the page cannot be prepared.
    pub async fn launch(settings: &BrowserSettings) -> Result<(Self, ChromiumPage), BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .request_timeout(settings.timeout);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut events) =
            Browser::launch(config).await.map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        if settings.auth_method == AuthMethod::Basic {
            if let Some(creds) = &settings.credentials {
                let token = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", creds.username, creds.password));
                let headers =
                    Headers::new(serde_json::json!({ "Authorization": format!("Basic {token}") }));
                page.execute(SetExtraHttpHeadersParams::new(headers)).await?;
                tracing::info!("browser requests carry basic auth header");
            }
        }

        let mut opened = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let dialog_page = page.clone();
        let dialogs = tokio::spawn(async move {
            while let Some(event) = opened.next().await {
                tracing::debug!(message = %event.message, "accepting dialog");
                if let Err(e) = dialog_page.execute(HandleJavaScriptDialogParams::new(true)).await {
                    tracing::warn!(error = %e, "could not accept dialog");
                }
            }
        });

        tracing::info!(headless = settings.headless, "browser launched");
        Ok((Self { browser, handler, dialogs }, ChromiumPage { page }))
    }

    /// Closes the browser and stops the background tasks.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser did not close cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "waiting for browser exit failed");
        }
        self.dialogs.abort();
        self.handler.abort();
        tracing::info!("browser closed");
    }
}

impl ChromiumPage {
    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element, BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::MissingElement(selector.to_owned()))
    }

    async fn ready_state(&self) -> Result<String, BrowserError> {
        self.page
            .evaluate("document.readyState")
            .await?
            .into_value::<String>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation { url: url.to_owned(), reason: e.to_string() })?;
        Ok(())
    }

    async fn wait_for_settle(&self, timeout: Duration) -> Result<(), BrowserError> {
        let settle = async {
            self.page.wait_for_navigation().await?;
            while self.ready_state().await? != "complete" {
                tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
            }
            Ok(())
        };
        if timeout.is_zero() {
            return settle.await;
        }
        tokio::time::timeout(timeout, settle).await.map_err(|_| BrowserError::Timeout(timeout))?
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let input = self.element(selector).await?;
        input.call_js_fn("function() { this.value = ''; }", false).await?;
        input.click().await?;
        input.type_str(value).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.element(selector).await?.click().await?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        Ok(self.page.find_elements(selector).await?.len())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let elements = self.page.find_elements(selector).await?;
        let target = elements
            .get(index)
            .ok_or_else(|| BrowserError::MissingElement(format!("{selector} #{index}")))?;
        target.click().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }
}
