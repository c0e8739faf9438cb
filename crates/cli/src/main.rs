use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use redmine_sweep_core::{PaginationSettings, RunContext, SweepConfig, SweepError};
use tracing_subscriber::EnvFilter;

mod commands;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "redmine-sweep")]
#[command(about = "Download and delete Redmine ticket attachments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the pagination range set in the environment.
#[derive(Args, Clone, Copy, Default)]
struct RangeArgs {
    #[arg(long)]
    offset_start: Option<u32>,
    /// Exclusive end offset, 0 for no limit
    #[arg(long)]
    offset_end: Option<u32>,
    #[arg(short, long)]
    limit: Option<u32>,
}

impl RangeArgs {
    fn apply(self, pagination: &mut PaginationSettings) -> Result<(), SweepError> {
        if let Some(start) = self.offset_start {
            pagination.offset_start = start;
        }
        if let Some(end) = self.offset_end {
            pagination.offset_end = (end > 0).then_some(end);
        }
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(SweepError::Configuration("--limit must be greater than 0".to_owned()));
            }
            pagination.limit = limit;
        }
        Ok(())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print tickets that have attachments as JSON
    List {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Download every attachment into one directory per ticket
    Download {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Delete every attachment through the web UI
    Delete {
        #[command(flatten)]
        range: RangeArgs,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

async fn run(cli: Cli, ctx: &RunContext) -> Result<()> {
    let mut config = SweepConfig::from_env()?;

    match cli.command {
        Commands::List { range } => {
            range.apply(&mut config.pagination)?;
            commands::list::run_list(&config, ctx).await
        },
        Commands::Download { range } => {
            range.apply(&mut config.pagination)?;
            commands::download::run_download(&config, ctx).await
        },
        Commands::Delete { range, yes } => {
            range.apply(&mut config.pagination)?;
            config.confirm_skip |= yes;
            commands::delete::run_delete(&config, ctx).await
        },
    }
}

fn exit_code(result: &Result<()>, ctx: &RunContext) -> u8 {
    match result {
        Ok(()) if ctx.is_cancelled() => {
            tracing::warn!("run interrupted, results above are partial");
            EXIT_CANCELLED
        },
        Ok(()) => 0,
        Err(e) => match e.downcast_ref::<SweepError>() {
            Some(SweepError::Configuration(msg)) => {
                tracing::error!("configuration error: {msg}");
                EXIT_CONFIG
            },
            Some(SweepError::Cancelled) => {
                tracing::warn!("cancelled by user");
                EXIT_CANCELLED
            },
            _ => {
                tracing::error!("{e:#}");
                EXIT_FAILURE
            },
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let ctx = RunContext::new();

    let signal = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            redmine_sweep_core::cancel::cancel(&signal);
        }
    });

    let result = run(cli, &ctx).await;
    let code = exit_code(&result, &ctx);
    if code == EXIT_CANCELLED {
        // A confirmation prompt may still be blocked on stdin.
        std::process::exit(i32::from(code));
    }
    ExitCode::from(code)
}
