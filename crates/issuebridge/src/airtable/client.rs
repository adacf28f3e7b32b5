//! Airtable API client creation and requests.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use super::error::{AirtableError, INVALID_SELECT_OPTION_TYPE, parse_select_option};
use super::types::{ErrorEnvelope, ListResponse, RecordsResponse, TablesResponse};
use crate::config::AirtableConnection;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::platform::{self, ApiRateLimiter, RecordQuery, RecordStore};
use crate::record::{Fields, StoreRecord};
use crate::schema::TableSchema;

/// Airtable REST API root.
pub const AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Airtable asks clients to back off for 30 seconds after a 429.
const RATE_LIMIT_BACKOFF_SECS: i64 = 30;

/// Airtable API client bound to one table.
#[derive(Clone)]
pub struct AirtableClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    api_key: String,
    base_id: String,
    /// Table name or id.
    table: String,
    /// Optional rate limiter for pacing API requests.
    rate_limiter: Option<ApiRateLimiter>,
}

impl AirtableClient {
    /// Create a new Airtable client.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let limiter = ApiRateLimiter::new(rate_limits::AIRTABLE_DEFAULT_RPS);
    /// let client = AirtableClient::new("pat...", "appXXXX", "Issues", Some(limiter))?;
    /// ```
    pub fn new(
        api_key: &str,
        base_id: &str,
        table: &str,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self, AirtableError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| AirtableError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            AIRTABLE_API_URL,
            api_key,
            base_id,
            table,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    /// Create a client from a connection config.
    pub fn from_connection(
        connection: &AirtableConnection,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self, AirtableError> {
        Self::new(
            &connection.api_key,
            &connection.base_id,
            &connection.table_name,
            rate_limiter,
        )
    }

    pub fn new_with_transport(
        api_url: &str,
        api_key: &str,
        base_id: &str,
        table: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            base_id: base_id.to_string(),
            table: table.to_string(),
            rate_limiter,
        }
    }

    /// Get the configured table name or id.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for rate limiter if one is configured.
    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Build a URL from path segments (each percent-encoded) and query pairs.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String, AirtableError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| AirtableError::Config(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| AirtableError::Config("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url.into())
    }

    fn error_from_response(response: &HttpResponse) -> AirtableError {
        if response.status == 429 {
            return AirtableError::RateLimited {
                reset_at: Utc::now() + chrono::Duration::seconds(RATE_LIMIT_BACKOFF_SECS),
            };
        }

        let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&response.body) else {
            return AirtableError::Api {
                status: response.status,
                message: response.body_text(),
            };
        };

        let error_type = envelope.error.error_type();
        let message = envelope.error.message();

        if error_type == INVALID_SELECT_OPTION_TYPE
            && let Some(option) = parse_select_option(message)
        {
            return AirtableError::InvalidSelectOption {
                option,
                message: message.to_string(),
            };
        }

        AirtableError::Api {
            status: response.status,
            message: if message.is_empty() {
                error_type.to_string()
            } else {
                format!("{error_type}: {message}")
            },
        }
    }

    /// Send an authenticated request and decode the JSON response.
    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<&Value>,
    ) -> Result<T, AirtableError> {
        self.wait_for_rate_limit().await;

        let mut request = HttpRequest {
            method,
            url,
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), "issuebridge".to_string()),
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.api_key),
                ),
            ],
            body: Vec::new(),
        };
        if let Some(body) = body {
            request = request.with_json(body);
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AirtableError::Http(e.to_string()))?;

        if !response.is_success() {
            return Err(Self::error_from_response(&response));
        }

        serde_json::from_slice(&response.body).map_err(AirtableError::Json)
    }

    /// Read the configured table's schema, matching by name or id.
    pub async fn table_schema(&self) -> Result<TableSchema, AirtableError> {
        let url = self.endpoint(&["meta", "bases", self.base_id.as_str(), "tables"], &[])?;
        let response: TablesResponse = self.request(HttpMethod::Get, url, None).await?;

        let available: Vec<String> = response.tables.iter().map(|t| t.name.clone()).collect();
        response
            .tables
            .into_iter()
            .find(|t| t.name == self.table || t.id == self.table)
            .map(TableSchema::from)
            .ok_or_else(|| AirtableError::TableNotFound {
                table: self.table.clone(),
                base_id: self.base_id.clone(),
                available,
            })
    }

    /// List records, following `offset` pagination until exhausted.
    pub async fn list(&self, query: &RecordQuery) -> Result<Vec<StoreRecord>, AirtableError> {
        let mut base_query: Vec<(&str, String)> = Vec::new();
        if let Some(ref formula) = query.formula {
            base_query.push(("filterByFormula", formula.clone()));
        }
        if let Some(max) = query.max_records {
            base_query.push(("maxRecords", max.to_string()));
        }
        if let Some((ref field, direction)) = query.sort {
            base_query.push(("sort[0][field]", field.clone()));
            base_query.push(("sort[0][direction]", direction.as_str().to_string()));
        }
        base_query.push(("returnFieldsByFieldId", "true".to_string()));

        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut page_query = base_query.clone();
            if let Some(ref offset) = offset {
                page_query.push(("offset", offset.clone()));
            }

            let url = self.endpoint(&[self.base_id.as_str(), self.table.as_str()], &page_query)?;
            let page: ListResponse = self.request(HttpMethod::Get, url, None).await?;
            records.extend(page.records.into_iter().map(StoreRecord::from));

            if query.max_records.is_some_and(|max| records.len() >= max) {
                break;
            }
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn write(
        &self,
        method: HttpMethod,
        records: Vec<Value>,
    ) -> Result<Vec<StoreRecord>, AirtableError> {
        let url = self.endpoint(&[self.base_id.as_str(), self.table.as_str()], &[])?;
        let body = json!({ "records": records, "returnFieldsByFieldId": true });
        let response: RecordsResponse = self.request(method, url, Some(&body)).await?;
        Ok(response.records.into_iter().map(StoreRecord::from).collect())
    }

    /// Create records (at most 10 per call).
    pub async fn create(&self, records: &[Fields]) -> Result<Vec<StoreRecord>, AirtableError> {
        let payload = records.iter().map(|f| json!({ "fields": f })).collect();
        self.write(HttpMethod::Post, payload).await
    }

    /// Update records by id (at most 10 per call). Unlisted fields are untouched.
    pub async fn update(
        &self,
        records: &[(String, Fields)],
    ) -> Result<Vec<StoreRecord>, AirtableError> {
        let payload = records
            .iter()
            .map(|(id, f)| json!({ "id": id, "fields": f }))
            .collect();
        self.write(HttpMethod::Patch, payload).await
    }

    /// Replace a select field's choices.
    pub async fn set_field_choices(
        &self,
        table_id: &str,
        field_id: &str,
        choices: &[String],
    ) -> Result<(), AirtableError> {
        let url = self.endpoint(
            &["meta", "bases", self.base_id.as_str(), "tables", table_id, "fields", field_id],
            &[],
        )?;
        let choices: Vec<Value> = choices.iter().map(|name| json!({ "name": name })).collect();
        let body = json!({ "options": { "choices": choices } });
        let _: Value = self.request(HttpMethod::Patch, url, Some(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn fetch_schema(&self) -> platform::Result<TableSchema> {
        Ok(self.table_schema().await?)
    }

    async fn list_records(&self, query: &RecordQuery) -> platform::Result<Vec<StoreRecord>> {
        Ok(self.list(query).await?)
    }

    async fn create_records(&self, records: &[Fields]) -> platform::Result<Vec<StoreRecord>> {
        Ok(self.create(records).await?)
    }

    async fn update_records(
        &self,
        records: &[(String, Fields)],
    ) -> platform::Result<Vec<StoreRecord>> {
        Ok(self.update(records).await?)
    }

    async fn update_field_choices(
        &self,
        table_id: &str,
        field_id: &str,
        choices: &[String],
    ) -> platform::Result<()> {
        Ok(self.set_field_choices(table_id, field_id, choices).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::platform::PlatformError;

    const API: &str = "https://airtable.test/v0";

    fn client(transport: &MockTransport) -> AirtableClient {
        AirtableClient::new_with_transport(
            API,
            "patSecret",
            "appBase",
            "Issues",
            None,
            Arc::new(transport.clone()),
        )
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    #[test]
    fn test_airtable_client_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AirtableClient>();
    }

    #[test]
    fn endpoint_encodes_table_names() {
        let transport = MockTransport::new();
        let client = AirtableClient::new_with_transport(
            API,
            "k",
            "appBase",
            "Jira Issues",
            None,
            Arc::new(transport),
        );
        let url = client
            .endpoint(&["appBase", "Jira Issues"], &[])
            .unwrap();
        assert_eq!(url, "https://airtable.test/v0/appBase/Jira%20Issues");
    }

    #[tokio::test]
    async fn fetch_schema_selects_table_by_name() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/meta/bases/appBase/tables"),
            200,
            json!({ "tables": [
                { "id": "tblOther", "name": "Other", "fields": [] },
                { "id": "tblIssues", "name": "Issues", "fields": [
                    { "id": "fldKey", "name": "Jira Key", "type": "singleLineText" }
                ] }
            ] }),
        );

        let schema = client(&transport).fetch_schema().await.unwrap();
        assert_eq!(schema.id, "tblIssues");
        assert_eq!(schema.field_name("fldKey"), "Jira Key");

        let requests = transport.requests();
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "authorization"),
            Some("Bearer patSecret")
        );
    }

    #[tokio::test]
    async fn fetch_schema_reports_missing_table() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/meta/bases/appBase/tables"),
            200,
            json!({ "tables": [{ "id": "tblOther", "name": "Other", "fields": [] }] }),
        );

        let err = client(&transport).fetch_schema().await.unwrap_err();
        match err {
            PlatformError::NotFound { resource } => assert!(resource.contains("Other")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_records_follows_offsets() {
        let transport = MockTransport::new();
        let base = format!("{API}/appBase/Issues");
        transport.push_json(
            HttpMethod::Get,
            format!("{base}?filterByFormula=%7BJira+Key%7D%3D%27A-1%27&returnFieldsByFieldId=true"),
            200,
            json!({ "records": [{ "id": "rec1", "fields": { "fldKey": "A-1" } }], "offset": "itr2" }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!(
                "{base}?filterByFormula=%7BJira+Key%7D%3D%27A-1%27&returnFieldsByFieldId=true&offset=itr2"
            ),
            200,
            json!({ "records": [{ "id": "rec2", "fields": { "fldKey": "A-1" } }] }),
        );

        let records = client(&transport)
            .list_records(&RecordQuery::filtered("{Jira Key}='A-1'"))
            .await
            .unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec1", "rec2"]);
    }

    #[tokio::test]
    async fn latest_by_sorts_descending_with_one_record() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!(
                "{API}/appBase/Issues?maxRecords=1&sort%5B0%5D%5Bfield%5D=fldUpdated&sort%5B0%5D%5Bdirection%5D=desc&returnFieldsByFieldId=true"
            ),
            200,
            json!({ "records": [{ "id": "rec9", "fields": { "fldUpdated": "2024-01-02T00:00:00.000Z" } }] }),
        );

        let records = client(&transport)
            .list_records(&RecordQuery::latest_by("fldUpdated"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].field_str("fldUpdated"),
            Some("2024-01-02T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn create_records_posts_fields() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/appBase/Issues"),
            200,
            json!({ "records": [{ "id": "recNew", "createdTime": "2024-01-01T00:00:00.000Z", "fields": { "fldKey": "A-1" } }] }),
        );

        let mut fields = Fields::new();
        fields.insert("fldKey".to_string(), json!("A-1"));
        let created = client(&transport).create_records(&[fields]).await.unwrap();
        assert_eq!(created[0].id, "recNew");

        let requests = transport.requests();
        assert_eq!(
            body_json(&requests[0]),
            json!({ "records": [{ "fields": { "fldKey": "A-1" } }], "returnFieldsByFieldId": true })
        );
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "content-type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn update_records_patches_ids() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Patch,
            format!("{API}/appBase/Issues"),
            200,
            json!({ "records": [{ "id": "rec1", "fields": {} }] }),
        );

        let mut fields = Fields::new();
        fields.insert("fldParent".to_string(), json!(["rec0"]));
        client(&transport)
            .update_records(&[("rec1".to_string(), fields)])
            .await
            .unwrap();

        let body = body_json(&transport.requests()[0]);
        assert_eq!(body["records"][0]["id"], json!("rec1"));
        assert_eq!(body["records"][0]["fields"]["fldParent"], json!(["rec0"]));
    }

    #[tokio::test]
    async fn unknown_select_option_is_classified() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/appBase/Issues"),
            422,
            json!({ "error": {
                "type": "INVALID_MULTIPLE_CHOICE_OPTIONS",
                "message": "Insufficient permissions to create new select option \"\"Blocked\"\""
            } }),
        );

        let err = client(&transport)
            .create_records(&[Fields::new()])
            .await
            .unwrap_err();
        assert_eq!(err.invalid_select_option(), Some("Blocked"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn other_validation_errors_keep_type_and_message() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{API}/appBase/Issues"),
            422,
            json!({ "error": { "type": "INVALID_VALUE_FOR_COLUMN", "message": "Field \"Points\" cannot accept the provided value" } }),
        );

        let err = client(&transport)
            .create_records(&[Fields::new()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlatformError::api(
                422,
                "INVALID_VALUE_FOR_COLUMN: Field \"Points\" cannot accept the provided value"
            )
        );
    }

    #[tokio::test]
    async fn too_many_requests_is_transient() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{API}/meta/bases/appBase/tables"),
            429,
            json!({ "errors": [{ "error": "RATE_LIMIT_REACHED" }] }),
        );

        let err = client(&transport).fetch_schema().await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn update_field_choices_patches_field_options() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Patch,
            format!("{API}/meta/bases/appBase/tables/tblIssues/fields/fldStatus"),
            200,
            json!({ "id": "fldStatus", "name": "Status", "type": "singleSelect" }),
        );

        client(&transport)
            .update_field_choices(
                "tblIssues",
                "fldStatus",
                &["To Do".to_string(), "Blocked".to_string()],
            )
            .await
            .unwrap();

        let body = body_json(&transport.requests()[0]);
        assert_eq!(
            body,
            json!({ "options": { "choices": [{ "name": "To Do" }, { "name": "Blocked" }] } })
        );
    }
}
