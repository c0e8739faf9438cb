use std::time::Duration;

use async_trait::async_trait;
use redmine_sweep_core::{
    ApiSettings, AttemptFailure, Credentials, Page, PaginationCursor, RetryError, RetryPolicy,
    RunContext, SweepError, Ticket, TicketSource,
};
use serde::Deserialize;

use crate::error::ClientError;

/// Header carrying the REST API key.
pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";
/// Status filter matching tickets in every state.
pub const ANY_STATUS: &str = "*";

/// Envelope of `GET /issues.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct IssuesResponse {
    #[serde(default)]
    pub issues: Vec<Ticket>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

/// Client for the Redmine REST API. One instance is reused for every request
/// of a run so connections are pooled.
pub struct RedmineClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) list_retry: RetryPolicy,
    pub(crate) download_retry: RetryPolicy,
}

impl std::fmt::Debug for RedmineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedmineClient")
            .field("http", &self.http)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("credentials", &self.credentials)
            .field("list_retry", &self.list_retry)
            .field("download_retry", &self.download_retry)
            .finish()
    }
}

impl RedmineClient {
    /// Creates a client from the API settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(settings: &ApiSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| ClientError::ClientInit(e.to_string()))?;

        if !settings.verify_ssl {
            tracing::warn!("TLS certificate verification is disabled");
        }
        if settings.api_key.is_some() {
            tracing::info!("listing with API key authentication");
        } else if settings.credentials.is_some() {
            tracing::info!("listing with username/password authentication");
        }

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            api_key: settings.api_key.clone(),
            credentials: settings.credentials.clone(),
            list_retry: settings.list_retry,
            download_retry: settings.download_retry,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues one list request, without retrying.
    ///
    /// # Errors
    /// Returns an error if the request fails, the API returns a non-success
    /// status, or the body is not a ticket list.
    pub async fn fetch_page(
        &self,
        cursor: &PaginationCursor,
        timeout: Duration,
    ) -> Result<Page, ClientError> {
        let query = [
            ("limit", cursor.limit().to_string()),
            ("offset", cursor.offset().to_string()),
            ("sort", cursor.sort().to_owned()),
            ("include", "attachments".to_owned()),
            ("status_id", ANY_STATUS.to_owned()),
        ];

        let mut request =
            self.http.get(format!("{}/issues.json", self.base_url)).query(&query);
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }
        request = match (&self.api_key, &self.credentials) {
            (Some(key), _) => request.header(API_KEY_HEADER, key),
            (None, Some(creds)) => request.basic_auth(&creds.username, Some(&creds.password)),
            (None, None) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                code: status.as_u16(),
                body: truncate(&body, 500).to_owned(),
            });
        }

        let parsed: IssuesResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::JsonParse {
                context: format!("issue list (body: {})", truncate(&body, 200)),
                source: e,
            })?;

        tracing::debug!(
            offset = cursor.offset(),
            limit = cursor.limit(),
            received = parsed.issues.len(),
            "ticket list request completed"
        );

        Ok(Page {
            tickets: parsed.issues,
            offset: cursor.offset(),
            limit: cursor.limit(),
            total_count: parsed.total_count,
        })
    }
}

/// Maps a terminal retry error to the run-level taxonomy.
pub(crate) fn into_sweep_error(err: RetryError<ClientError>) -> SweepError {
    if err.is_cancelled() {
        return SweepError::Cancelled;
    }
    if let Some(AttemptFailure::Failed(last)) = err.last_failure() {
        if !last.is_transient() {
            tracing::warn!(error = %last, "last failure is not transient, check URL and credentials");
        }
    }
    SweepError::Fetch(err.to_string())
}

#[async_trait]
impl TicketSource for RedmineClient {
    async fn list_tickets(&self, cursor: &PaginationCursor, ctx: &RunContext) -> Result<Page, SweepError> {
        self.list_retry
            .run("list tickets", ctx.signal(), move |attempt| self.fetch_page(cursor, attempt.timeout))
            .await
            .map_err(into_sweep_error)
    }
}

/// Truncates a string to the given maximum length at a char boundary.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        s.get(..end).unwrap_or("")
    }
}
