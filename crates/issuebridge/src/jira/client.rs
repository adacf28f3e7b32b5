//! Jira API client creation and requests.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use url::Url;

use super::convert::to_source_record;
use super::error::JiraError;
use super::types::{ErrorBody, JiraUser, SearchResponse};
use crate::config::JiraConnection;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{self, ApiRateLimiter, IssueSource};
use crate::record::SourceRecord;

/// Seconds to wait after a 429 without a `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: i64 = 60;

/// Jira REST (v2) API client.
#[derive(Clone)]
pub struct JiraClient {
    transport: Arc<dyn HttpTransport>,
    server: String,
    auth_header: String,
    /// Optional rate limiter for pacing API requests.
    rate_limiter: Option<ApiRateLimiter>,
}

impl JiraClient {
    /// Create a new Jira client using basic auth (`username:api_token`).
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = JiraClient::new("https://example.atlassian.net", "bot@example.com", "token", None)?;
    /// ```
    pub fn new(
        server: &str,
        username: &str,
        api_token: &str,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self, JiraError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| JiraError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            server,
            username,
            api_token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    /// Create a client from a connection config.
    pub fn from_connection(
        connection: &JiraConnection,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self, JiraError> {
        Self::new(
            &connection.server,
            &connection.username,
            &connection.api_token,
            rate_limiter,
        )
    }

    pub fn new_with_transport(
        server: &str,
        username: &str,
        api_token: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let credentials = BASE64.encode(format!("{username}:{api_token}"));
        Self {
            transport,
            server: server.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {credentials}"),
            rate_limiter,
        }
    }

    /// Get the server URL.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Wait for rate limiter if one is configured.
    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<String, JiraError> {
        let mut url = Url::parse(&format!("{}/rest/api/2{}", self.server, path))
            .map_err(|e| JiraError::Config(format!("invalid server URL: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url.into())
    }

    fn retry_after(response: &HttpResponse) -> DateTime<Utc> {
        let secs = response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        Utc::now() + chrono::Duration::seconds(secs)
    }

    /// Make an authenticated GET request.
    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T, JiraError> {
        self.wait_for_rate_limit().await;

        let request = HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "issuebridge".to_string()),
                ("Authorization".to_string(), self.auth_header.clone()),
            ],
            body: Vec::new(),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| JiraError::Http(e.to_string()))?;

        if response.status == 429 {
            return Err(JiraError::RateLimited {
                reset_at: Self::retry_after(&response),
            });
        }

        if !response.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&response.body)
                .ok()
                .and_then(|body| body.summary())
                .unwrap_or_else(|| response.body_text());
            return Err(JiraError::Api {
                status: response.status,
                message,
            });
        }

        serde_json::from_slice(&response.body).map_err(JiraError::Json)
    }

    /// The authenticated user's profile.
    pub async fn myself(&self) -> Result<JiraUser, JiraError> {
        let url = self.endpoint("/myself", &[])?;
        self.get(url).await
    }

    /// Run a JQL search.
    ///
    /// With `expand`, every field plus the changelog is returned; without it
    /// only keys are requested (used for counting).
    pub async fn search(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
        expand: bool,
    ) -> Result<SearchResponse, JiraError> {
        let mut query = vec![
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if expand {
            query.push(("expand", "changelog".to_string()));
            query.push(("fields", "*all".to_string()));
        } else {
            query.push(("fields", "key".to_string()));
        }

        let url = self.endpoint("/search", &query)?;
        let page: SearchResponse = self.get(url).await?;

        tracing::debug!(
            start_at,
            returned = page.issues.len(),
            total = page.total,
            "Jira search page"
        );
        Ok(page)
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn server_timezone(&self) -> platform::Result<Option<String>> {
        let user = self.myself().await?;
        Ok(user.time_zone.filter(|tz| !tz.is_empty()))
    }

    async fn count_issues(&self, jql: &str) -> platform::Result<usize> {
        Ok(self.search(jql, 0, 0, false).await?.total)
    }

    async fn search_issues(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
    ) -> platform::Result<Vec<SourceRecord>> {
        let page = self.search(jql, start_at, max_results, true).await?;
        Ok(page.issues.into_iter().map(to_source_record).collect())
    }
}
