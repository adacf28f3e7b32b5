//! Configuration file support for issuebridge.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `ISSUEBRIDGE_`, sections split by
//!    `__`, e.g. `ISSUEBRIDGE_JIRA__API_TOKEN`)
//! 3. Legacy environment variables (`JIRA_SERVER`, `AIRTABLE_API_KEY`, ...)
//! 4. Config file (./issuebridge.toml, then ~/.config/issuebridge/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [jira]
//! server = "https://example.atlassian.net"
//! username = "bot@example.com"
//! api_token = "..."        # or use JIRA_API_TOKEN
//! project_key = "PROJ"     # or set `jql` for a custom base filter
//! page_size = 100
//!
//! [airtable]
//! api_key = "pat..."       # or use AIRTABLE_API_KEY
//! base_id = "appXXXXXXXX"
//! table_name = "Issues"
//! batch_size = 10
//!
//! [sync]
//! interval_minutes = 60
//!
//! [field_map]
//! key = "fldKey"
//! summary = "fldSummary"
//! age = { airtable_field_id = "fldAge", skip = true }
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use issuebridge::{
    AirtableConnection, ConfigurationError, FieldMapping, JiraConnection, RetryConfig,
    SyncConfig, rate_limits,
};

/// Default minutes between scheduled runs.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jira (source) configuration.
    pub jira: JiraConfig,
    /// Airtable (target) configuration.
    pub airtable: AirtableConfig,
    /// Sync behaviour.
    pub sync: SyncSection,
    /// Jira field name to Airtable field id.
    pub field_map: Option<FieldMapping>,
}

/// Jira configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Base URL, e.g. `https://example.atlassian.net`.
    pub server: Option<String>,
    pub username: Option<String>,
    /// API token. Can also be set via JIRA_API_TOKEN.
    pub api_token: Option<String>,
    /// Project whose issues are synced.
    pub project_key: Option<String>,
    /// Custom base filter, replacing `project = <project_key>`.
    pub jql: Option<String>,
    /// Extra filter ANDed onto the base filter.
    pub extra_filter: Option<String>,
    /// Issues per search page.
    pub page_size: Option<usize>,
}

/// Airtable configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AirtableConfig {
    /// Personal access token. Can also be set via AIRTABLE_API_KEY.
    pub api_key: Option<String>,
    pub base_id: Option<String>,
    /// Table name or id.
    pub table_name: Option<String>,
    /// Records per create/update request.
    pub batch_size: Option<usize>,
    /// Requests per second.
    pub rate_limit_rps: Option<u32>,
}

/// Sync behaviour.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Minutes between runs in scheduled mode.
    pub interval_minutes: u64,
    /// Retries per remote call.
    pub max_retries: Option<usize>,
    /// Report what would be written without writing.
    pub dry_run: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_retries: None,
            dry_run: false,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigurationError::InvalidValue {
            name: name.to_string(),
            message: e.to_string(),
        })
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/issuebridge/config.toml)
    /// 3. Local config file (./issuebridge.toml)
    /// 4. Environment variables with ISSUEBRIDGE_ prefix
    ///
    /// Legacy variables then fill whatever is still unset.
    pub fn load() -> Result<Self, ConfigurationError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("issuebridge.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./issuebridge.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., ISSUEBRIDGE_JIRA__SERVER -> jira.server
        builder = builder.add_source(
            Environment::with_prefix("ISSUEBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ConfigurationError::InvalidValue {
                name: "config".to_string(),
                message: e.to_string(),
            })?;

        config.apply_legacy_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Fill unset values from the legacy environment variables.
    pub fn apply_legacy_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigurationError> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let strings = [
            (&mut self.jira.server, "JIRA_SERVER"),
            (&mut self.jira.username, "JIRA_USERNAME"),
            (&mut self.jira.api_token, "JIRA_API_TOKEN"),
            (&mut self.jira.project_key, "JIRA_PROJECT_KEY"),
            (&mut self.jira.jql, "JIRA_JQL_FILTER"),
            (&mut self.airtable.api_key, "AIRTABLE_API_KEY"),
            (&mut self.airtable.base_id, "AIRTABLE_BASE_ID"),
            (&mut self.airtable.table_name, "AIRTABLE_TABLE_NAME"),
        ];
        for (slot, name) in strings {
            if slot.is_none() {
                *slot = var(name);
            }
        }

        if self.field_map.is_none()
            && let Some(json) = var("JIRA_TO_AIRTABLE_FIELD_MAP")
        {
            self.field_map = Some(FieldMapping::from_json_str(&json)?);
        }
        if self.airtable.batch_size.is_none()
            && let Some(raw) = var("BATCH_SIZE")
        {
            self.airtable.batch_size = Some(parse_number("BATCH_SIZE", &raw)?);
        }
        if self.jira.page_size.is_none()
            && let Some(raw) = var("MAX_RESULTS")
        {
            self.jira.page_size = Some(parse_number("MAX_RESULTS", &raw)?);
        }
        if let Some(raw) = var("SYNC_INTERVAL_MINUTES") {
            self.sync.interval_minutes = parse_number("SYNC_INTERVAL_MINUTES", &raw)?;
        }

        Ok(())
    }

    /// Build the library configuration. Validation is left to the caller.
    pub fn to_sync_config(&self) -> SyncConfig {
        let defaults = SyncConfig::default();
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let retry = match self.sync.max_retries {
            Some(max_retries) => RetryConfig {
                max_retries,
                ..RetryConfig::default()
            },
            None => RetryConfig::default(),
        };

        SyncConfig {
            jira: JiraConnection {
                server: text(&self.jira.server),
                username: text(&self.jira.username),
                api_token: text(&self.jira.api_token),
            },
            airtable: AirtableConnection {
                api_key: text(&self.airtable.api_key),
                base_id: text(&self.airtable.base_id),
                table_name: text(&self.airtable.table_name),
            },
            field_map: self.field_map.clone().unwrap_or_default(),
            project_key: self.jira.project_key.clone(),
            jql: self.jira.jql.clone(),
            extra_filter: self.jira.extra_filter.clone(),
            page_size: self.jira.page_size.unwrap_or(defaults.page_size),
            batch_size: self.airtable.batch_size.unwrap_or(defaults.batch_size),
            rate_limit_rps: self
                .airtable
                .rate_limit_rps
                .unwrap_or(rate_limits::AIRTABLE_DEFAULT_RPS),
            retry,
            dry_run: self.sync.dry_run,
            ..defaults
        }
    }

    /// Path of the user config file.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "issuebridge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
