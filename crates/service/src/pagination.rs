use std::time::Duration;

use redmine_sweep_core::{
    Page, PaginationCursor, PaginationSettings, RunContext, SweepError, Ticket, TicketSource,
    sleep_or_cancel,
};
use serde::Serialize;

/// Why pagination ended. Every reason keeps the pages already returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// The cursor reached the configured end offset.
    RangeExhausted,
    /// The server returned an empty page.
    NoMoreData,
    /// The previous page was shorter than the page size.
    LastPage,
    /// A list request exhausted its retries.
    FetchFailed(String),
    Cancelled,
}

#[derive(Debug)]
pub enum PaginationStep {
    Page(Page),
    Stop(StopReason),
}

/// Offset-based walk over the ticket list.
///
/// Offsets strictly increase and every branch that does not advance the
/// cursor stops the walk, so it always terminates.
#[derive(Debug)]
pub struct Paginator {
    cursor: PaginationCursor,
    request_interval: Duration,
    /// The last page was full, so the next fetch is preceded by the delay.
    delay_pending: bool,
    pages: usize,
    stopped: Option<StopReason>,
}

impl Paginator {
    #[must_use]
    pub fn new(settings: &PaginationSettings) -> Self {
        Self::from_cursor(settings.cursor(), settings.request_interval)
    }

    #[must_use]
    pub const fn from_cursor(cursor: PaginationCursor, request_interval: Duration) -> Self {
        Self { cursor, request_interval, delay_pending: false, pages: 0, stopped: None }
    }

    #[must_use]
    pub const fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn stop(&mut self, reason: StopReason) -> PaginationStep {
        tracing::info!(offset = self.cursor.offset(), pages = self.pages, ?reason, "pagination stopped");
        self.stopped = Some(reason.clone());
        PaginationStep::Stop(reason)
    }

    /// Fetches the next page, or reports why there is none. Once stopped, keeps
    /// returning the same reason without touching the source.
    pub async fn next_page(&mut self, source: &dyn TicketSource, ctx: &RunContext) -> PaginationStep {
        if let Some(reason) = &self.stopped {
            return PaginationStep::Stop(reason.clone());
        }
        if self.cursor.is_exhausted() {
            return self.stop(StopReason::RangeExhausted);
        }
        if self.delay_pending && sleep_or_cancel(self.request_interval, ctx.signal()).await.is_err() {
            return self.stop(StopReason::Cancelled);
        }
        if ctx.is_cancelled() {
            return self.stop(StopReason::Cancelled);
        }

        let page = match source.list_tickets(&self.cursor, ctx).await {
            Ok(page) => page,
            Err(SweepError::Cancelled) => return self.stop(StopReason::Cancelled),
            Err(e) => {
                tracing::error!(
                    offset = self.cursor.offset(),
                    error = %e,
                    "list request failed, keeping results so far"
                );
                return self.stop(StopReason::FetchFailed(e.to_string()));
            },
        };

        self.pages += 1;
        ctx.counters.page_fetched();
        tracing::info!(
            offset = self.cursor.offset(),
            limit = self.cursor.limit(),
            received = page.len(),
            "fetched ticket page"
        );

        if page.is_empty() {
            return self.stop(StopReason::NoMoreData);
        }
        if page.is_short() {
            self.stopped = Some(StopReason::LastPage);
            tracing::info!(offset = self.cursor.offset(), pages = self.pages, "last page reached");
        } else {
            self.cursor.advance();
            self.delay_pending = !self.request_interval.is_zero();
        }
        PaginationStep::Page(page)
    }
}

/// Tickets that carry attachments, gathered over the whole range.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedTickets {
    pub tickets: Vec<Ticket>,
    pub pages: usize,
    pub stop: StopReason,
}

impl CollectedTickets {
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.tickets.iter().map(|t| t.attachments().len()).sum()
    }
}

/// Keeps the tickets of `page` that have attachments.
pub fn tickets_with_attachments(page: Page, ctx: &RunContext) -> Vec<Ticket> {
    let matched: Vec<Ticket> = page.tickets.into_iter().filter(Ticket::has_attachments).collect();
    ctx.counters.tickets_matched(matched.len());
    matched
}

/// Walks the configured range and accumulates every ticket with attachments.
pub async fn collect_tickets_with_attachments(
    source: &dyn TicketSource,
    settings: &PaginationSettings,
    ctx: &RunContext,
) -> CollectedTickets {
    let mut paginator = Paginator::new(settings);
    let mut tickets = Vec::new();
    loop {
        match paginator.next_page(source, ctx).await {
            PaginationStep::Page(page) => tickets.extend(tickets_with_attachments(page, ctx)),
            PaginationStep::Stop(stop) => {
                tracing::info!(tickets = tickets.len(), "tickets with attachments collected");
                return CollectedTickets { tickets, pages: paginator.pages_fetched(), stop };
            },
        }
    }
}
