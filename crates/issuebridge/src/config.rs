//! Validated configuration consumed by the sync engine.
//!
//! Loading (files, environment, `.env`) is the caller's job; this module only
//! holds the values and checks that they are usable.

use serde::Deserialize;
use url::Url;

use crate::error::ConfigurationError;
use crate::mapping::FieldMapping;
use crate::platform::rate_limits;
use crate::retry::RetryConfig;
use crate::sync::{
    DEFAULT_BATCH_SIZE, DEFAULT_MATCH_CHUNK_SIZE, DEFAULT_PAGE_SIZE, MAX_BATCH_SIZE,
    MAX_PAGE_SIZE, SyncOptions,
};

/// Connection to the Jira instance issues are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JiraConnection {
    /// Base URL, e.g. `https://example.atlassian.net`.
    pub server: String,
    pub username: String,
    pub api_token: String,
}

/// Connection to the Airtable table records are written to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AirtableConnection {
    pub api_key: String,
    pub base_id: String,
    /// Table name or id.
    pub table_name: String,
}

/// Everything a sync run needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub jira: JiraConnection,
    pub airtable: AirtableConnection,
    pub field_map: FieldMapping,
    /// Project whose issues are synced. Used when `jql` is not set.
    pub project_key: Option<String>,
    /// Explicit base filter, replacing `project = <project_key>`.
    pub jql: Option<String>,
    /// Extra filter ANDed onto the base filter.
    pub extra_filter: Option<String>,
    pub page_size: usize,
    pub batch_size: usize,
    pub match_chunk_size: usize,
    /// Airtable requests per second.
    pub rate_limit_rps: u32,
    pub retry: RetryConfig,
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            jira: JiraConnection::default(),
            airtable: AirtableConnection::default(),
            field_map: FieldMapping::default(),
            project_key: None,
            jql: None,
            extra_filter: None,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            match_chunk_size: DEFAULT_MATCH_CHUNK_SIZE,
            rate_limit_rps: rate_limits::AIRTABLE_DEFAULT_RPS,
            retry: RetryConfig::default(),
            dry_run: false,
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl SyncConfig {
    /// Check that every required parameter is present and usable.
    ///
    /// All missing parameters are reported together.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut missing = Vec::new();

        let required = [
            ("jira.server", &self.jira.server),
            ("jira.username", &self.jira.username),
            ("jira.api_token", &self.jira.api_token),
            ("airtable.api_key", &self.airtable.api_key),
            ("airtable.base_id", &self.airtable.base_id),
            ("airtable.table_name", &self.airtable.table_name),
        ];
        for (name, value) in required {
            if is_blank(value) {
                missing.push(name.to_string());
            }
        }

        if non_blank(self.jql.as_ref()).is_none() && non_blank(self.project_key.as_ref()).is_none()
        {
            missing.push("jira.project_key (or jira.jql)".to_string());
        }

        if self.field_map.is_empty() {
            missing.push("field_map".to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigurationError::MissingParameters(missing));
        }

        if let Err(e) = Url::parse(&self.jira.server) {
            return Err(ConfigurationError::InvalidValue {
                name: "jira.server".to_string(),
                message: e.to_string(),
            });
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigurationError::InvalidValue {
                name: "page_size".to_string(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.batch_size > MAX_BATCH_SIZE {
            tracing::warn!(
                batch_size = self.batch_size,
                max = MAX_BATCH_SIZE,
                "Batch size exceeds the Airtable limit, clamping"
            );
        }

        Ok(())
    }

    /// The base query: the explicit JQL, or every issue of the project.
    #[must_use]
    pub fn base_filter(&self) -> String {
        if let Some(jql) = non_blank(self.jql.as_ref()) {
            return jql.to_string();
        }
        non_blank(self.project_key.as_ref())
            .map(|key| format!("project = {key}"))
            .unwrap_or_default()
    }

    /// Engine options derived from this configuration.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            base_filter: self.base_filter(),
            extra_filter: non_blank(self.extra_filter.as_ref()).map(str::to_string),
            page_size: self.page_size,
            batch_size: self.batch_size,
            match_chunk_size: self.match_chunk_size,
            retry: self.retry.clone(),
            dry_run: self.dry_run,
            ..SyncOptions::default()
        }
    }
}
