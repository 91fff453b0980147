// crates/cli/src/main.rs
//! applytrack command-line client.
//!
//! Starts a mailbox sync against the backend and renders its progress with a
//! terminal bar, or prints the persistent summary of the last sync.

mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use applytrack_core::{
    metrics, ClientConfig, HttpBackend, PrefsStore, StartOutcome, SummaryStore, SyncEvent,
    SyncFailure, SyncOrchestrator,
};
use applytrack_types::SyncMode;
use clap::{ArgGroup, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "applytrack", version, about = "Sync job-application emails from Gmail")]
struct Cli {
    /// Backend base URL (overrides config file and APPLYTRACK_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the mailbox and update tracked applications.
    Sync {
        /// Scan a fixed number of days back instead of since the last sync.
        #[arg(long, value_name = "N")]
        window_days: Option<u32>,
    },
    /// Show the outcome of the last sync.
    Status,
    /// Show or hide raw details in the summary panel.
    #[command(group(ArgGroup::new("toggle").required(true).args(["open", "close"])))]
    Details {
        #[arg(long)]
        open: bool,
        #[arg(long)]
        close: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,applytrack_core=info,applytrack=info",
        _ => "info,applytrack_core=debug,applytrack=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn build_orchestrator(cli: &Cli) -> Result<SyncOrchestrator> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    tracing::debug!(api_url = %config.api_url, "loaded client config");

    let prefs = match &config.prefs_path {
        Some(path) => PrefsStore::at(path),
        None => PrefsStore::in_memory(),
    };
    let timing = config.timing.clone();
    let backend = HttpBackend::new(config)?;
    Ok(SyncOrchestrator::new(
        Arc::new(backend),
        timing,
        SummaryStore::new(prefs),
    ))
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        eprintln!("{line}");
    }
}

async fn refresh_or_warn(orch: &SyncOrchestrator) {
    if let Err(e) = orch.refresh_summary().await {
        tracing::warn!(error = %e, "could not load last sync status");
    }
}

/// How long to wait for the start-sync response after the poller already
/// confirmed completion.
const REQUEST_GRACE: Duration = Duration::from_secs(5);

async fn wait_for_request(events: &mut broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(SyncEvent::RequestSettled { .. }) | Err(RecvError::Closed) => return,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

async fn run_sync(orch: &SyncOrchestrator, mode: SyncMode) -> Result<()> {
    refresh_or_warn(orch).await;

    let mut events = orch.subscribe();
    let mut progress = orch.subscribe_progress();
    let job_id = match orch.start(mode) {
        StartOutcome::Started(job_id) => job_id,
        StartOutcome::AlreadyRunning => bail!("a sync is already running"),
    };
    tracing::info!(job_id = %job_id, mode = mode.as_str(), "sync requested");

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("  {spinner} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    let started = Instant::now();

    let outcome: Option<Result<(), SyncFailure>> = loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break None;
                }
                let snapshot = progress.borrow_and_update().clone();
                pb.set_position(u64::from(snapshot.percent()));
                pb.set_message(snapshot.phase_label);
            }
            event = events.recv() => match event {
                Ok(SyncEvent::Completed { .. }) => break Some(Ok(())),
                Ok(SyncEvent::Failed { failure, .. }) => break Some(Err(failure)),
                Ok(SyncEvent::PollingStopped { .. }) => {
                    pb.set_message("Waiting for the server to finish…");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "sync event stream lagged");
                }
                Err(RecvError::Closed) => break None,
            }
        }
    };

    match outcome {
        Some(Ok(())) => {
            pb.set_position(100);
            if orch.request_pending() {
                // The poller confirmed first; the request carries the full metrics.
                pb.set_message("Collecting results…");
                if tokio::time::timeout(REQUEST_GRACE, wait_for_request(&mut events))
                    .await
                    .is_err()
                {
                    tracing::debug!("sync request still pending; showing poll-based summary");
                }
            }
            pb.finish_and_clear();
            eprintln!(
                "  \u{2713} Sync complete ({:.1}s)\n",
                started.elapsed().as_secs_f64()
            );
            print_lines(render::summary_lines(&orch.summary_view()));
            Ok(())
        }
        Some(Err(failure)) => {
            pb.abandon();
            print_lines(render::failure_lines(&failure));
            bail!("sync failed: {}", failure.message)
        }
        None => {
            pb.abandon();
            bail!("sync ended without a result")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    metrics::describe_metrics();

    let orch = build_orchestrator(&cli)?;

    match cli.command {
        Command::Sync { window_days } => {
            let mode = match window_days {
                Some(days) => SyncMode::fixed_window(days)?,
                None => SyncMode::SinceLast,
            };
            run_sync(&orch, mode).await
        }
        Command::Status => {
            refresh_or_warn(&orch).await;
            print_lines(render::summary_lines(&orch.summary_view()));
            Ok(())
        }
        Command::Details { open, .. } => {
            orch.set_details_open(open)?;
            refresh_or_warn(&orch).await;
            print_lines(render::summary_lines(&orch.summary_view()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[tokio::test]
    async fn test_wait_for_request_skips_other_events() {
        let (tx, mut rx) = broadcast::channel(8);
        let job_id = applytrack_types::JobId::from("job-1");
        tx.send(SyncEvent::Completed {
            job_id: job_id.clone(),
        })
        .unwrap();
        tx.send(SyncEvent::RequestSettled { job_id }).unwrap();

        tokio::time::timeout(Duration::from_secs(1), wait_for_request(&mut rx))
            .await
            .expect("settled event should end the wait");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_window_days() {
        let cli = Cli::try_parse_from(["applytrack", "sync", "--window-days", "30"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Sync {
                window_days: Some(30)
            }
        ));
    }

    #[test]
    fn test_details_requires_exactly_one_toggle() {
        assert!(Cli::try_parse_from(["applytrack", "details"]).is_err());
        assert!(Cli::try_parse_from(["applytrack", "details", "--open", "--close"]).is_err());
        assert!(Cli::try_parse_from(["applytrack", "details", "--close"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["applytrack", "status", "--api-url", "http://x", "-vv"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x"));
        assert_eq!(cli.verbose, 2);
    }
}
