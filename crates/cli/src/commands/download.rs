use std::sync::Arc;

use anyhow::Result;
use redmine_sweep_client::RedmineClient;
use redmine_sweep_core::{AttachmentDownloader, RunContext, SweepConfig, TicketSource};
use redmine_sweep_service::DownloadService;

pub(crate) async fn run_download(config: &SweepConfig, ctx: &RunContext) -> Result<()> {
    config.require_api_auth()?;
    let client = Arc::new(RedmineClient::new(&config.api)?);
    tracing::info!(
        base_url = client.base_url(),
        directory = %config.download.directory.display(),
        "starting download"
    );

    let service = DownloadService::new(
        Arc::clone(&client) as Arc<dyn TicketSource>,
        client as Arc<dyn AttachmentDownloader>,
        config.pagination.clone(),
        config.download.clone(),
    );
    let report = service.run(ctx).await?;

    if report.summary.failed > 0 {
        tracing::warn!(failed = report.summary.failed, "some attachments could not be downloaded");
    }
    ctx.log_summary();
    Ok(())
}
