use std::collections::BTreeMap;

use serde::Serialize;

/// Position of an attachment within its ticket's delete list (1-based index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttachmentPosition {
    pub index: usize,
    pub total: usize,
}

/// An unresolved deletion that needs a human to finish it.
///
/// `attachment` is `None` when the ticket could not be processed at all
/// (page failed to load), so no specific attachment was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualActionRecord {
    pub ticket_id: u64,
    pub attachment: Option<AttachmentPosition>,
    pub error: String,
}

impl std::fmt::Display for ManualActionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.attachment {
            Some(pos) => write!(
                f,
                "ticket {} - attachment {}/{} - error: {}",
                self.ticket_id, pos.index, pos.total, self.error
            ),
            None => write!(f, "ticket {} - error: {}", self.ticket_id, self.error),
        }
    }
}

/// Result of cleaning one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDeleteReport {
    pub ticket_id: u64,
    /// Delete controls found on the page when processing started.
    pub found: usize,
    pub deleted: usize,
    pub manual_actions: Vec<ManualActionRecord>,
    /// Processing stopped early because the run was cancelled.
    pub cancelled: bool,
}

impl TicketDeleteReport {
    #[must_use]
    pub const fn empty(ticket_id: u64) -> Self {
        Self { ticket_id, found: 0, deleted: 0, manual_actions: Vec::new(), cancelled: false }
    }

    /// Success only if nothing was left for manual follow-up.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.manual_actions.is_empty() && !self.cancelled
    }
}

/// Aggregate result of a batch delete, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Ticket id to success flag.
    pub results: BTreeMap<u64, bool>,
    /// Ticket ids in the order they were processed.
    pub order: Vec<u64>,
    pub manual_actions: Vec<ManualActionRecord>,
    pub attachments_deleted: usize,
    /// The batch stopped early; tickets not in `order` were never attempted.
    pub cancelled: bool,
}

impl DeleteOutcome {
    pub fn record(&mut self, report: TicketDeleteReport) {
        let success = report.is_success();
        self.results.insert(report.ticket_id, success);
        self.order.push(report.ticket_id);
        self.attachments_deleted += report.deleted;
        self.manual_actions.extend(report.manual_actions);
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Failed ticket ids in processing order.
    #[must_use]
    pub fn failed_tickets(&self) -> Vec<u64> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.results.get(id).is_some_and(|ok| !ok))
            .collect()
    }
}

/// Totals for a download run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub tickets: usize,
    pub attachments: usize,
    pub downloaded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(ticket_id: u64) -> ManualActionRecord {
        ManualActionRecord {
            ticket_id,
            attachment: Some(AttachmentPosition { index: 1, total: 1 }),
            error: "click timed out".to_owned(),
        }
    }

    #[test]
    fn test_outcome_aggregates_reports() {
        let mut outcome = DeleteOutcome::default();
        outcome.record(TicketDeleteReport { deleted: 2, found: 2, ..TicketDeleteReport::empty(1) });
        outcome.record(TicketDeleteReport {
            found: 1,
            manual_actions: vec![manual(2)],
            ..TicketDeleteReport::empty(2)
        });
        outcome.record(TicketDeleteReport::empty(3));

        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.failure_count(), 1);
        assert_eq!(outcome.failed_tickets(), vec![2]);
        assert_eq!(outcome.attachments_deleted, 2);
        assert_eq!(outcome.manual_actions.len(), 1);
    }

    #[test]
    fn test_manual_record_display() {
        assert_eq!(manual(9).to_string(), "ticket 9 - attachment 1/1 - error: click timed out");
        let ticket_level =
            ManualActionRecord { ticket_id: 4, attachment: None, error: "404".to_owned() };
        assert_eq!(ticket_level.to_string(), "ticket 4 - error: 404");
    }
}
