pub(crate) mod schema;
pub(crate) mod sync;

use clap::ValueEnum;

use issuebridge::{AirtableClient, ApiRateLimiter, JiraClient, SyncConfig, rate_limits};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Build the Airtable client. Requests are paced to the configured rate.
pub(crate) fn airtable_client(
    config: &SyncConfig,
) -> Result<AirtableClient, Box<dyn std::error::Error>> {
    let limiter = ApiRateLimiter::new(config.rate_limit_rps);
    Ok(AirtableClient::from_connection(
        &config.airtable,
        Some(limiter),
    )?)
}

/// Build the Jira client.
pub(crate) fn jira_client(config: &SyncConfig) -> Result<JiraClient, Box<dyn std::error::Error>> {
    let limiter = ApiRateLimiter::new(rate_limits::JIRA_DEFAULT_RPS);
    Ok(JiraClient::from_connection(&config.jira, Some(limiter))?)
}
