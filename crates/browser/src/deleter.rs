//! Per-ticket attachment removal through the web UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redmine_sweep_core::{
    Attempt, AttachmentDeleter, AttachmentPosition, AuthMethod, BrowserSettings, Credentials,
    ManualActionRecord, Result, RetryPolicy, RunContext, SweepError, TicketDeleteReport,
    sleep_or_cancel,
};

use crate::error::BrowserError;
use crate::page::BrowserPage;

pub const LOGIN_PATH: &str = "/login";
const USERNAME_INPUT: &str = r#"input[name="username"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const SUBMIT_BUTTON: &str = r#"input[type="submit"]"#;
pub const ATTACHMENTS_SECTION: &str = ".attachments";
pub const DELETE_CONTROL: &str = ".attachments .delete";
/// Pause after a delete click before waiting for the page to settle.
const CLICK_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Removes attachments by clicking their delete controls, one at a time.
///
/// Always targets the first remaining control: the attachment list
/// re-renders after each removal so the next one moves to the front.
pub struct BrowserDeleteClient<P> {
    pub(crate) page: P,
    base_url: String,
    auth_method: AuthMethod,
    timeout: Duration,
    delete_interval: Duration,
    retry: RetryPolicy,
    logged_in: AtomicBool,
}

impl<P: BrowserPage> BrowserDeleteClient<P> {
    #[must_use]
    pub fn new(page: P, settings: &BrowserSettings) -> Self {
        Self {
            page,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            auth_method: settings.auth_method,
            timeout: settings.timeout,
            delete_interval: settings.delete_interval,
            retry: settings.delete_retry,
            logged_in: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    /// Establishes the authenticated session.
    ///
    /// Basic auth is carried by request headers configured at launch, so there
    /// is nothing to do. Otherwise the login form is submitted and the login
    /// succeeded if the browser left the login page.
    ///
    /// # Errors
    /// [`SweepError::Authentication`] if the form could not be submitted or
    /// the browser is still on the login page afterwards.
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        if self.auth_method == AuthMethod::Basic {
            tracing::info!("using basic auth, skipping login form");
            self.logged_in.store(true, Ordering::Release);
            return Ok(());
        }

        let url = format!("{}{LOGIN_PATH}", self.base_url);
        tracing::info!(%url, username = %credentials.username, "logging in");
        let landed = self.submit_login(&url, credentials).await.map_err(|e| match e {
            BrowserError::Login(reason) => SweepError::Authentication(reason),
            other => SweepError::Authentication(other.to_string()),
        })?;

        tracing::info!(url = %landed, "logged in");
        self.logged_in.store(true, Ordering::Release);
        Ok(())
    }

    async fn submit_login(&self, url: &str, credentials: &Credentials) -> std::result::Result<String, BrowserError> {
        self.page.goto(url).await?;
        self.page.wait_for_settle(self.timeout).await?;
        self.page.fill(USERNAME_INPUT, &credentials.username).await?;
        self.page.fill(PASSWORD_INPUT, &credentials.password).await?;
        self.page.click(SUBMIT_BUTTON).await?;
        self.page.wait_for_settle(self.timeout).await?;

        let landed = self.page.current_url().await?;
        if landed.contains(LOGIN_PATH) {
            return Err(BrowserError::Login(format!("still on the login page ({landed})")));
        }
        Ok(landed)
    }

    /// Opens the ticket page and counts the delete controls.
    async fn open_ticket(&self, ticket_id: u64) -> std::result::Result<usize, BrowserError> {
        let url = format!("{}/issues/{ticket_id}", self.base_url);
        self.page.goto(&url).await?;
        self.page.wait_for_settle(self.timeout).await?;

        if self.page.count(ATTACHMENTS_SECTION).await? == 0 {
            return Ok(0);
        }
        self.page.count(DELETE_CONTROL).await
    }

    /// One attempt at removing the first remaining attachment.
    ///
    /// `expected` is the number of controls present before this attachment
    /// was first clicked. On a retry, fewer controls means the earlier click
    /// went through and only the settle wait failed.
    async fn delete_first(&self, expected: usize, attempt: Attempt) -> std::result::Result<(), BrowserError> {
        if attempt.is_retry() {
            let remaining = self.page.count(DELETE_CONTROL).await?;
            if remaining < expected {
                tracing::debug!(remaining, expected, "previous click already removed the attachment");
                return Ok(());
            }
        }

        self.page.click_nth(DELETE_CONTROL, 0).await?;
        tokio::time::sleep(CLICK_SETTLE_DELAY).await;
        self.page.wait_for_settle(attempt.timeout).await
    }
}

#[async_trait]
impl<P: BrowserPage> AttachmentDeleter for BrowserDeleteClient<P> {
    async fn delete_ticket_attachments(
        &self,
        ticket_id: u64,
        ctx: &RunContext,
    ) -> Result<TicketDeleteReport> {
        if !self.is_logged_in() {
            return Err(SweepError::Authentication("browser session is not logged in".to_owned()));
        }
        if ctx.is_cancelled() {
            return Err(SweepError::Cancelled);
        }

        let mut report = TicketDeleteReport::empty(ticket_id);
        let total = self.open_ticket(ticket_id).await.map_err(|e| {
            SweepError::Browser(format!("could not open ticket {ticket_id}: {e}"))
        })?;
        report.found = total;
        if total == 0 {
            tracing::info!(ticket_id, "no attachments to delete");
            return Ok(report);
        }
        tracing::info!(ticket_id, count = total, "deleting attachments");

        for i in 0..total {
            let position = AttachmentPosition { index: i + 1, total };
            let expected = total - report.deleted;
            let result = self
                .retry
                .run("delete attachment", ctx.signal(), move |attempt| {
                    self.delete_first(expected, attempt)
                })
                .await;

            match result {
                Ok(()) => {
                    report.deleted += 1;
                    ctx.counters.attachment_deleted();
                    tracing::info!(ticket_id, attachment = position.index, total, "attachment deleted");
                },
                Err(e) => {
                    let cancelled = e.is_cancelled();
                    tracing::warn!(
                        ticket_id,
                        attachment = position.index,
                        total,
                        error = %e,
                        "attachment delete gave up"
                    );
                    report.manual_actions.push(ManualActionRecord {
                        ticket_id,
                        attachment: Some(position),
                        error: e.to_string(),
                    });
                    if cancelled {
                        report.cancelled = true;
                        break;
                    }
                },
            }

            if i + 1 < total && sleep_or_cancel(self.delete_interval, ctx.signal()).await.is_err() {
                report.cancelled = true;
                break;
            }
        }

        tracing::info!(
            ticket_id,
            deleted = report.deleted,
            found = report.found,
            manual = report.manual_actions.len(),
            "ticket processed"
        );
        Ok(report)
    }
}
