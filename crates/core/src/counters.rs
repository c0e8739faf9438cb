//! Per-run observability context: cancellation plus counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::cancel::{self, CancellationSignal};

/// Counters for one run. Shared by reference; relaxed ordering is enough since
/// values are only read for the end-of-run summary.
#[derive(Debug, Default)]
pub struct RunCounters {
    pages_fetched: AtomicUsize,
    tickets_matched: AtomicUsize,
    downloads_succeeded: AtomicUsize,
    downloads_failed: AtomicUsize,
    attachments_deleted: AtomicUsize,
    manual_actions: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub pages_fetched: usize,
    pub tickets_matched: usize,
    pub downloads_succeeded: usize,
    pub downloads_failed: usize,
    pub attachments_deleted: usize,
    pub manual_actions: usize,
}

impl RunCounters {
    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tickets_matched(&self, n: usize) {
        self.tickets_matched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn download_finished(&self, ok: bool) {
        if ok {
            self.downloads_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.downloads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn attachment_deleted(&self) {
        self.attachments_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn manual_action(&self) {
        self.manual_actions.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            tickets_matched: self.tickets_matched.load(Ordering::Relaxed),
            downloads_succeeded: self.downloads_succeeded.load(Ordering::Relaxed),
            downloads_failed: self.downloads_failed.load(Ordering::Relaxed),
            attachments_deleted: self.attachments_deleted.load(Ordering::Relaxed),
            manual_actions: self.manual_actions.load(Ordering::Relaxed),
        }
    }
}

/// Context threaded through every component call of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub cancel: CancellationSignal,
    pub counters: Arc<RunCounters>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    #[must_use]
    pub fn new() -> Self {
        Self { cancel: cancel::new_signal(), counters: Arc::new(RunCounters::default()) }
    }

    /// The cancellation signal in the form the retry and sleep helpers take.
    #[must_use]
    pub const fn signal(&self) -> Option<&CancellationSignal> {
        Some(&self.cancel)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        cancel::is_cancelled(self.signal())
    }

    pub fn log_summary(&self) {
        let s = self.counters.snapshot();
        tracing::info!(
            pages_fetched = s.pages_fetched,
            tickets_matched = s.tickets_matched,
            downloads_succeeded = s.downloads_succeeded,
            downloads_failed = s.downloads_failed,
            attachments_deleted = s.attachments_deleted,
            manual_actions = s.manual_actions,
            "run summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let ctx = RunContext::new();
        ctx.counters.page_fetched();
        ctx.counters.page_fetched();
        ctx.counters.download_finished(true);
        ctx.counters.download_finished(false);
        ctx.counters.tickets_matched(3);

        let s = ctx.counters.snapshot();
        assert_eq!(s.pages_fetched, 2);
        assert_eq!(s.downloads_succeeded, 1);
        assert_eq!(s.downloads_failed, 1);
        assert_eq!(s.tickets_matched, 3);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_context_cancellation_is_shared_across_clones() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        cancel::cancel(&clone.cancel);
        assert!(ctx.is_cancelled());
    }
}
