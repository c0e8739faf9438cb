use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redmine_sweep_core::{
    AttachmentDeleter, AttachmentPosition, ManualActionRecord, Result, RunContext, SweepError,
    TicketDeleteReport,
};

use crate::delete_service::BatchDeleteOrchestrator;

#[derive(Clone, Copy)]
enum Behavior {
    Clean(usize),
    /// The only attachment exhausts its retries.
    Exhausted,
    PageFails,
    Cancelled,
    LoggedOut,
}

struct ScriptedDeleter {
    behaviors: HashMap<u64, Behavior>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedDeleter {
    fn new(behaviors: &[(u64, Behavior)]) -> Arc<Self> {
        Arc::new(Self { behaviors: behaviors.iter().copied().collect(), calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentDeleter for ScriptedDeleter {
    async fn delete_ticket_attachments(&self, ticket_id: u64, _ctx: &RunContext) -> Result<TicketDeleteReport> {
        self.calls.lock().unwrap().push(ticket_id);
        let empty = TicketDeleteReport::empty(ticket_id);
        match self.behaviors.get(&ticket_id).copied().unwrap_or(Behavior::Clean(1)) {
            Behavior::Clean(n) => Ok(TicketDeleteReport { found: n, deleted: n, ..empty }),
            Behavior::Exhausted => Ok(TicketDeleteReport {
                found: 1,
                manual_actions: vec![ManualActionRecord {
                    ticket_id,
                    attachment: Some(AttachmentPosition { index: 1, total: 1 }),
                    error: "delete attachment: all 4 attempts failed".to_owned(),
                }],
                ..empty
            }),
            Behavior::PageFails => Err(SweepError::Browser(format!("could not open ticket {ticket_id}"))),
            Behavior::Cancelled => Ok(TicketDeleteReport { found: 2, deleted: 1, cancelled: true, ..empty }),
            Behavior::LoggedOut => Err(SweepError::Authentication("session expired".to_owned())),
        }
    }
}

fn orchestrator(deleter: &Arc<ScriptedDeleter>) -> BatchDeleteOrchestrator {
    BatchDeleteOrchestrator::new(Arc::clone(deleter) as Arc<dyn AttachmentDeleter>, Duration::ZERO)
}

#[tokio::test]
async fn test_one_exhausted_ticket_among_three() {
    let deleter = ScriptedDeleter::new(&[(2, Behavior::Exhausted)]);
    let ctx = RunContext::new();

    let outcome = orchestrator(&deleter).delete_many(&[1, 2, 3], &ctx).await.unwrap();

    assert_eq!(outcome.results, BTreeMap::from([(1, true), (2, false), (3, true)]));
    assert_eq!(outcome.manual_actions.len(), 1);
    assert_eq!(outcome.manual_actions[0].ticket_id, 2);
    assert_eq!(outcome.success_count(), 2);
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(outcome.failed_tickets(), vec![2]);
    assert!(!outcome.cancelled);
    assert_eq!(ctx.counters.snapshot().manual_actions, 1);
}

#[tokio::test]
async fn test_input_order_is_kept() {
    let deleter = ScriptedDeleter::new(&[]);

    let outcome = orchestrator(&deleter).delete_many(&[30, 10, 20], &RunContext::new()).await.unwrap();

    assert_eq!(deleter.calls(), vec![30, 10, 20]);
    assert_eq!(outcome.order, vec![30, 10, 20]);
    assert_eq!(outcome.attachments_deleted, 3);
}

#[tokio::test]
async fn test_unopenable_ticket_is_ticket_level_manual_action() {
    let deleter = ScriptedDeleter::new(&[(5, Behavior::PageFails)]);

    let outcome = orchestrator(&deleter).delete_many(&[5, 6], &RunContext::new()).await.unwrap();

    assert_eq!(deleter.calls(), vec![5, 6]);
    assert_eq!(outcome.results.get(&5), Some(&false));
    assert_eq!(outcome.results.get(&6), Some(&true));
    let record = &outcome.manual_actions[0];
    assert_eq!(record.attachment, None);
    assert!(record.error.contains("ticket 5"));
}

#[tokio::test]
async fn test_unexpected_error_aborts_remaining_batch() {
    let deleter = ScriptedDeleter::new(&[(2, Behavior::LoggedOut)]);

    let err = orchestrator(&deleter).delete_many(&[1, 2, 3], &RunContext::new()).await.unwrap_err();

    assert!(matches!(err, SweepError::Authentication(_)));
    assert_eq!(deleter.calls(), vec![1, 2]);
}

#[tokio::test]
async fn test_cancelled_ticket_ends_batch_with_partial_outcome() {
    let deleter = ScriptedDeleter::new(&[(2, Behavior::Cancelled)]);

    let outcome = orchestrator(&deleter).delete_many(&[1, 2, 3], &RunContext::new()).await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(deleter.calls(), vec![1, 2]);
    assert_eq!(outcome.order, vec![1, 2]);
    assert_eq!(outcome.results.get(&2), Some(&false));
    assert_eq!(outcome.attachments_deleted, 2);
}

#[tokio::test]
async fn test_cancelled_before_start_attempts_nothing() {
    let deleter = ScriptedDeleter::new(&[]);
    let ctx = RunContext::new();
    redmine_sweep_core::cancel::cancel(&ctx.cancel);

    let outcome = orchestrator(&deleter).delete_many(&[1, 2], &ctx).await.unwrap();

    assert!(outcome.cancelled);
    assert!(deleter.calls().is_empty());
    assert!(outcome.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_interval_between_tickets_not_after_last() {
    let deleter = ScriptedDeleter::new(&[]);
    let orchestrator =
        BatchDeleteOrchestrator::new(Arc::clone(&deleter) as Arc<dyn AttachmentDeleter>, Duration::from_secs(1));

    let start = tokio::time::Instant::now();
    orchestrator.delete_many(&[1, 2, 3], &RunContext::new()).await.unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_millis(2100));
}
