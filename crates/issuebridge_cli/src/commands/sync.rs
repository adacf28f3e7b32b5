//! The sync command: one run, or runs on a fixed interval.

use std::time::Duration;

use console::style;
use serde::Serialize;
use tabled::Tabled;
use tokio::time::MissedTickBehavior;

use issuebridge::{SyncEngine, SyncFailure, SyncSummary};

use super::{OutputFormat, airtable_client, jira_client};
use crate::config::Config;
use crate::progress::LoggingReporter;
use crate::shutdown;

/// Options for the sync command.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SyncArgs {
    /// Keep running, syncing every interval until Ctrl+C
    #[arg(short, long)]
    pub schedule: bool,

    /// Minutes between scheduled runs (default from config or 60)
    #[arg(short, long)]
    pub interval_minutes: Option<u64>,

    /// Dry run - fetch and match, but don't write anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

/// Handle the sync command.
pub(crate) async fn handle_sync(
    args: SyncArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sync_config = config.to_sync_config();
    sync_config.dry_run |= args.dry_run;
    sync_config.validate()?;

    let jira = jira_client(&sync_config)?;
    let airtable = airtable_client(&sync_config)?;
    let engine = SyncEngine::new(
        &jira,
        &airtable,
        sync_config.field_map.clone(),
        sync_config.sync_options(),
    );
    let progress = LoggingReporter::new().into_callback();

    if !args.schedule {
        let summary = engine.sync(Some(&progress)).await?;
        print_summary(&summary, args.output);
        if summary.has_failures() {
            return Err(format!(
                "sync finished with {} failure(s)",
                summary.failures.len()
            )
            .into());
        }
        return Ok(());
    }

    let minutes = args
        .interval_minutes
        .unwrap_or(config.sync.interval_minutes)
        .max(1);
    shutdown::setup_shutdown_handler();
    tracing::info!(interval_minutes = minutes, "Starting scheduled sync");

    let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown::requested() => break,
        }

        match engine.sync(Some(&progress)).await {
            Ok(summary) => print_summary(&summary, args.output),
            Err(e) if e.is_configuration() => return Err(e.into()),
            Err(e) => {
                tracing::error!("Sync run failed: {}", e);
                eprintln!("{} Sync run failed: {}", style("✗").red(), e);
            }
        }

        if shutdown::is_shutdown_requested() {
            break;
        }
    }

    tracing::info!("Scheduled sync stopped");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct CountRow {
    #[tabled(rename = "Result")]
    result: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct FailureRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Issues")]
    keys: String,
    #[tabled(rename = "Error")]
    message: String,
}

impl From<&SyncFailure> for FailureRow {
    fn from(failure: &SyncFailure) -> Self {
        Self {
            kind: failure.kind.to_string(),
            keys: failure.keys.join(", "),
            message: failure.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryReport {
    dry_run: bool,
    counts: Vec<CountRow>,
    failures: Vec<FailureRow>,
}

impl From<&SyncSummary> for SummaryReport {
    fn from(summary: &SyncSummary) -> Self {
        let counts = vec![
            CountRow {
                result: "fetched",
                count: summary.fetched,
            },
            CountRow {
                result: "created",
                count: summary.created,
            },
            CountRow {
                result: "updated",
                count: summary.updated,
            },
            CountRow {
                result: "linked",
                count: summary.linked,
            },
            CountRow {
                result: "options added",
                count: summary.options_added,
            },
        ];
        Self {
            dry_run: summary.dry_run,
            counts,
            failures: summary.failures.iter().map(FailureRow::from).collect(),
        }
    }
}

fn print_summary(summary: &SyncSummary, format: OutputFormat) {
    let report = SummaryReport::from(summary);

    match format {
        OutputFormat::Table => {
            if report.dry_run {
                println!("{} Dry run, nothing was written", style("ℹ").blue());
            }
            let mut table = tabled::Table::new(&report.counts);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);

            if report.failures.is_empty() {
                println!("{} Sync complete", style("✓").green());
            } else {
                println!(
                    "{} {} failure(s):",
                    style("⚠").yellow(),
                    report.failures.len()
                );
                let mut table = tabled::Table::new(&report.failures);
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize summary: {}", e),
        },
    }
}
