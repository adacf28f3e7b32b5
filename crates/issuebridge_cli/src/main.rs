//! Issuebridge CLI - one-way sync of Jira issues into an Airtable table.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;
use crate::commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "issuebridge")]
#[command(version)]
#[command(about = "Incremental one-way sync of Jira issues into Airtable")]
#[command(
    long_about = "Issuebridge copies Jira issues into an Airtable table. Each run only \
fetches issues updated since the newest record in the table, creates or updates one \
record per issue, and links child issues to their parents."
)]
#[command(after_long_help = r#"EXAMPLES
    Run one sync:
        $ issuebridge sync

    See what a sync would do without writing:
        $ issuebridge sync --dry-run

    Sync every 15 minutes until Ctrl+C:
        $ issuebridge sync --schedule --interval-minutes 15

    Check the field mapping against the Airtable table:
        $ issuebridge schema --validate

CONFIGURATION
    Issuebridge reads configuration from:
      1. ~/.config/issuebridge/config.toml (or $XDG_CONFIG_HOME/issuebridge/config.toml)
      2. ./issuebridge.toml
      3. Environment variables (ISSUEBRIDGE_* prefix, e.g., ISSUEBRIDGE_JIRA__SERVER)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    JIRA_SERVER                  Jira base URL
    JIRA_USERNAME                Jira account email
    JIRA_API_TOKEN               Jira API token
    JIRA_PROJECT_KEY             Project to sync
    JIRA_JQL_FILTER              Custom base filter (replaces the project filter)
    AIRTABLE_API_KEY             Airtable personal access token
    AIRTABLE_BASE_ID             Airtable base id
    AIRTABLE_TABLE_NAME          Airtable table name or id
    JIRA_TO_AIRTABLE_FIELD_MAP   Field mapping as JSON
    BATCH_SIZE                   Records per write request (max 10)
    MAX_RESULTS                  Issues per search page (max 100)
    SYNC_INTERVAL_MINUTES        Minutes between scheduled runs
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync issues into the target table
    Sync(SyncArgs),
    /// Show the target table's fields
    Schema {
        /// Check that every mapped field exists
        #[arg(long)]
        validate: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("issuebridge=info,issuebridge_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load()?;

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync(args, &config).await?,
        Commands::Schema { validate, output } => {
            commands::schema::handle_schema(validate, output, &config).await?;
        }
    }

    Ok(())
}
