use std::path::Path;
use std::sync::Arc;

use redmine_sweep_core::sanitize::{resolve_collision, sanitize};
use redmine_sweep_core::{
    AttachmentDownloader, DownloadSettings, DownloadSummary, PaginationSettings, Result, RunContext,
    Ticket, TicketSource, sleep_or_cancel,
};
use serde::Serialize;

use crate::pagination::{PaginationStep, Paginator, StopReason, tickets_with_attachments};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub summary: DownloadSummary,
    pub stop: StopReason,
}

/// Downloads every attachment of the configured range into
/// `<root>/<ticket_id>/`, page by page, strictly sequentially.
pub struct DownloadService {
    source: Arc<dyn TicketSource>,
    downloader: Arc<dyn AttachmentDownloader>,
    pagination: PaginationSettings,
    settings: DownloadSettings,
}

impl DownloadService {
    #[must_use]
    pub fn new(
        source: Arc<dyn TicketSource>,
        downloader: Arc<dyn AttachmentDownloader>,
        pagination: PaginationSettings,
        settings: DownloadSettings,
    ) -> Self {
        Self { source, downloader, pagination, settings }
    }

    /// Runs the download path. Individual download failures are counted, not
    /// raised.
    ///
    /// # Errors
    /// Returns an IO error if the download root cannot be prepared.
    pub async fn run(&self, ctx: &RunContext) -> Result<DownloadReport> {
        self.prepare_root().await?;

        let mut summary = DownloadSummary::default();
        let mut paginator = Paginator::new(&self.pagination);
        let stop = loop {
            match paginator.next_page(self.source.as_ref(), ctx).await {
                PaginationStep::Page(page) => {
                    let tickets = tickets_with_attachments(page, ctx);
                    if !self.download_tickets(&tickets, &mut summary, ctx).await {
                        break StopReason::Cancelled;
                    }
                },
                PaginationStep::Stop(reason) => break reason,
            }
        };

        tracing::info!(
            tickets = summary.tickets,
            attachments = summary.attachments,
            downloaded = summary.downloaded,
            failed = summary.failed,
            ?stop,
            "download finished"
        );
        Ok(DownloadReport { summary, stop })
    }

    async fn prepare_root(&self) -> Result<()> {
        let root = &self.settings.directory;
        if self.settings.clear_before_run && tokio::fs::try_exists(root).await? {
            tracing::info!(path = %root.display(), "clearing download directory");
            tokio::fs::remove_dir_all(root).await?;
        }
        tokio::fs::create_dir_all(root).await?;
        Ok(())
    }

    /// Returns `false` once the run has been cancelled.
    async fn download_tickets(&self, tickets: &[Ticket], summary: &mut DownloadSummary, ctx: &RunContext) -> bool {
        for (i, ticket) in tickets.iter().enumerate() {
            if !self.download_ticket(ticket, summary, ctx).await {
                return false;
            }
            if i + 1 < tickets.len() && sleep_or_cancel(self.settings.interval, ctx.signal()).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn download_ticket(&self, ticket: &Ticket, summary: &mut DownloadSummary, ctx: &RunContext) -> bool {
        let dir = self.settings.directory.join(ticket.id().to_string());
        let attachments = ticket.attachments();
        summary.tickets += 1;
        summary.attachments += attachments.len();

        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::error!(
                ticket_id = ticket.id(),
                path = %dir.display(),
                error = %e,
                "could not create ticket directory"
            );
            summary.failed += attachments.len();
            for _ in attachments {
                ctx.counters.download_finished(false);
            }
            return !ctx.is_cancelled();
        }
        tracing::info!(
            ticket_id = ticket.id(),
            subject = ticket.subject(),
            count = attachments.len(),
            "downloading ticket attachments"
        );

        for (i, attachment) in attachments.iter().enumerate() {
            if ctx.is_cancelled() {
                return false;
            }
            let ok = match target_name(&dir, &attachment.filename) {
                Some(name) => self.downloader.download_attachment(attachment, &dir, &name, ctx).await,
                None => false,
            };
            ctx.counters.download_finished(ok);
            if ok {
                summary.downloaded += 1;
            } else {
                summary.failed += 1;
            }

            if i + 1 < attachments.len() && sleep_or_cancel(self.settings.interval, ctx.signal()).await.is_err() {
                return false;
            }
        }
        !ctx.is_cancelled()
    }
}

/// Sanitized, collision-free filename inside `dir`.
fn target_name(dir: &Path, remote: &str) -> Option<String> {
    let path = resolve_collision(dir, &sanitize(remote));
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
