use anyhow::Result;
use redmine_sweep_client::RedmineClient;
use redmine_sweep_core::{RunContext, SweepConfig, TicketSummary};
use redmine_sweep_service::{StopReason, collect_tickets_with_attachments};
use serde::Serialize;

#[derive(Serialize)]
struct Listing {
    tickets: Vec<TicketSummary>,
    attachments: usize,
    pages: usize,
    stop: StopReason,
}

pub(crate) async fn run_list(config: &SweepConfig, ctx: &RunContext) -> Result<()> {
    config.require_api_auth()?;
    let client = RedmineClient::new(&config.api)?;

    let collected = collect_tickets_with_attachments(&client, &config.pagination, ctx).await;
    let listing = Listing {
        attachments: collected.attachment_count(),
        tickets: collected.tickets.iter().map(|t| t.summary()).collect(),
        pages: collected.pages,
        stop: collected.stop,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);

    ctx.log_summary();
    Ok(())
}
