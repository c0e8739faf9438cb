use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use redmine_sweep_browser::{BrowserDeleteClient, ChromiumPage, ChromiumSession};
use redmine_sweep_client::RedmineClient;
use redmine_sweep_core::cancel::await_or_cancel;
use redmine_sweep_core::{Credentials, DeleteOutcome, RunContext, SweepConfig, SweepError};
use redmine_sweep_service::{BatchDeleteOrchestrator, CollectedTickets, collect_tickets_with_attachments};

pub(crate) async fn run_delete(config: &SweepConfig, ctx: &RunContext) -> Result<()> {
    config.require_api_auth()?;
    let credentials = config.require_browser_auth()?;
    let client = RedmineClient::new(&config.api)?;

    let collected = collect_tickets_with_attachments(&client, &config.pagination, ctx).await;
    if ctx.is_cancelled() {
        return Err(SweepError::Cancelled.into());
    }
    if collected.tickets.is_empty() {
        tracing::info!("no tickets with attachments in range, nothing to delete");
        return Ok(());
    }

    log_plan(&collected);
    if config.confirm_skip {
        tracing::info!("confirmation skipped");
    } else if !confirm(&collected, ctx).await? {
        return Err(SweepError::Cancelled.into());
    }

    let ids: Vec<u64> = collected.tickets.iter().map(|t| t.id()).collect();
    let (session, page) = ChromiumSession::launch(&config.browser).await?;
    let result = delete_all(page, credentials, &ids, config, ctx).await;
    session.close().await;
    let outcome = result?;

    log_results(&collected, &outcome);
    ctx.log_summary();
    Ok(())
}

async fn delete_all(
    page: ChromiumPage,
    credentials: &Credentials,
    ids: &[u64],
    config: &SweepConfig,
    ctx: &RunContext,
) -> Result<DeleteOutcome, SweepError> {
    let deleter = Arc::new(BrowserDeleteClient::new(page, &config.browser));
    deleter.login(credentials).await?;

    let orchestrator = BatchDeleteOrchestrator::new(deleter, config.browser.delete_interval);
    orchestrator.delete_many(ids, ctx).await
}

fn log_plan(collected: &CollectedTickets) {
    tracing::info!("tickets to clean:");
    for ticket in &collected.tickets {
        tracing::info!(
            ticket_id = ticket.id(),
            subject = ticket.subject(),
            attachments = ticket.attachments().len(),
            "planned"
        );
    }
    tracing::info!(
        tickets = collected.tickets.len(),
        attachments = collected.attachment_count(),
        "total to delete"
    );
}

/// Asks on stderr. Anything but y/yes declines; so does Ctrl-C.
async fn confirm(collected: &CollectedTickets, ctx: &RunContext) -> Result<bool> {
    let prompt = format!(
        "Delete {} attachments from {} tickets? [y/N]: ",
        collected.attachment_count(),
        collected.tickets.len()
    );
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stderr = io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    });

    let joined = await_or_cancel(answer, ctx.signal()).await.map_err(|_| SweepError::Cancelled)?;
    let line = joined??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn log_results(collected: &CollectedTickets, outcome: &DeleteOutcome) {
    let subjects: HashMap<u64, &str> = collected.tickets.iter().map(|t| (t.id(), t.subject())).collect();
    for id in &outcome.order {
        let ok = outcome.results.get(id).copied().unwrap_or(false);
        let subject = subjects.get(id).copied().unwrap_or_default();
        if ok {
            tracing::info!(ticket_id = id, subject, "attachments removed");
        } else {
            tracing::warn!(ticket_id = id, subject, "needs manual follow-up");
        }
    }

    tracing::info!(
        succeeded = outcome.success_count(),
        failed = outcome.failure_count(),
        attachments_deleted = outcome.attachments_deleted,
        "delete finished"
    );
    if !outcome.manual_actions.is_empty() {
        tracing::warn!(
            count = outcome.manual_actions.len(),
            "attachments left for manual deletion, see [MANUAL_DELETE_REQUIRED] lines"
        );
    }
    let failed = outcome.failed_tickets();
    if !failed.is_empty() {
        tracing::warn!(tickets = ?failed, "tickets needing manual follow-up");
    }
}
