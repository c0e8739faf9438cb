//! Capability seams between the orchestration layer and the transports.

use std::path::Path;

use async_trait::async_trait;

use crate::{Attachment, Page, PaginationCursor, Result, RunContext, TicketDeleteReport};

/// Paginated ticket listing.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch the page at `cursor`, retrying per the source's policy.
    ///
    /// # Errors
    /// [`crate::SweepError::Fetch`] once retries are exhausted,
    /// [`crate::SweepError::Cancelled`] if the run was interrupted.
    async fn list_tickets(&self, cursor: &PaginationCursor, ctx: &RunContext) -> Result<Page>;
}

/// Attachment content download.
#[async_trait]
pub trait AttachmentDownloader: Send + Sync {
    /// Stream `attachment` to `directory/filename`. Never fails the batch:
    /// returns `false` when the file could not be stored.
    async fn download_attachment(
        &self,
        attachment: &Attachment,
        directory: &Path,
        filename: &str,
        ctx: &RunContext,
    ) -> bool;
}

/// Removal of every attachment of one ticket.
#[async_trait]
pub trait AttachmentDeleter: Send + Sync {
    /// # Errors
    /// [`crate::SweepError::Browser`] if the ticket could not be processed at
    /// all, [`crate::SweepError::Cancelled`] if interrupted before any
    /// attachment was attempted.
    async fn delete_ticket_attachments(
        &self,
        ticket_id: u64,
        ctx: &RunContext,
    ) -> Result<TicketDeleteReport>;
}
