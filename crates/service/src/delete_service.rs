use std::sync::Arc;
use std::time::Duration;

use redmine_sweep_core::{
    AttachmentDeleter, DeleteOutcome, ManualActionRecord, Result, RunContext, SweepError,
    TicketDeleteReport, sleep_or_cancel,
};

/// Applies an [`AttachmentDeleter`] to a list of tickets, one at a time.
///
/// The deleter owns a single stateful browser session, so tickets are never
/// processed in parallel.
pub struct BatchDeleteOrchestrator {
    deleter: Arc<dyn AttachmentDeleter>,
    delete_interval: Duration,
}

impl BatchDeleteOrchestrator {
    #[must_use]
    pub fn new(deleter: Arc<dyn AttachmentDeleter>, delete_interval: Duration) -> Self {
        Self { deleter, delete_interval }
    }

    /// Deletes the attachments of every ticket, in input order.
    ///
    /// A ticket that cannot be opened becomes a ticket-level manual action and
    /// the batch moves on. Cancellation ends the batch with the outcome
    /// flagged `cancelled`.
    ///
    /// # Errors
    /// Any other error (lost login, IO) aborts the remaining batch.
    pub async fn delete_many(&self, ticket_ids: &[u64], ctx: &RunContext) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();

        for (i, &ticket_id) in ticket_ids.iter().enumerate() {
            if ctx.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            tracing::info!(ticket_id, position = i + 1, total = ticket_ids.len(), "processing ticket");

            let report = match self.deleter.delete_ticket_attachments(ticket_id, ctx).await {
                Ok(report) => report,
                Err(SweepError::Browser(reason)) => TicketDeleteReport {
                    manual_actions: vec![ManualActionRecord { ticket_id, attachment: None, error: reason }],
                    ..TicketDeleteReport::empty(ticket_id)
                },
                Err(SweepError::Cancelled) => {
                    outcome.cancelled = true;
                    break;
                },
                Err(e) => {
                    tracing::error!(
                        ticket_id,
                        processed = outcome.order.len(),
                        remaining = ticket_ids.len() - i,
                        error = %e,
                        "batch delete aborted"
                    );
                    return Err(e);
                },
            };

            let stop = report.cancelled;
            record(&mut outcome, report, ctx);
            if stop {
                outcome.cancelled = true;
                break;
            }

            if i + 1 < ticket_ids.len() && sleep_or_cancel(self.delete_interval, ctx.signal()).await.is_err() {
                outcome.cancelled = true;
                break;
            }
        }

        tracing::info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            attachments_deleted = outcome.attachments_deleted,
            manual_actions = outcome.manual_actions.len(),
            cancelled = outcome.cancelled,
            "batch delete finished"
        );
        Ok(outcome)
    }
}

fn record(outcome: &mut DeleteOutcome, report: TicketDeleteReport, ctx: &RunContext) {
    for action in &report.manual_actions {
        tracing::error!("[MANUAL_DELETE_REQUIRED] {action}");
        ctx.counters.manual_action();
    }
    if !report.is_success() {
        tracing::error!(
            "[DELETE_FAILED] ticket {} - deleted {}/{}",
            report.ticket_id,
            report.deleted,
            report.found
        );
    }
    outcome.record(report);
}
