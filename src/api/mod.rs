//! Asana REST client: one page per call, with retry and rate-limit handling.
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::model::{ErrorsResponse, Page, Project, User, Workspace};
use crate::retry::{retry, RetryPolicy};

pub mod error;

pub use error::ApiError;

pub const ASANA_API_BASE: &str = "https://app.asana.com/api/1.0";

/// Query parameters for a list endpoint. `limit` is always sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub workspace: Option<String>,
    pub offset: Option<String>,
    pub opt_fields: Option<String>,
}

impl ListQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            workspace: None,
            offset: None,
            opt_fields: None,
        }
    }

    pub fn in_workspace(mut self, gid: impl Into<String>) -> Self {
        self.workspace = Some(gid.into());
        self
    }

    pub fn with_opt_fields(mut self, fields: impl Into<String>) -> Self {
        self.opt_fields = Some(fields.into());
        self
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if let Some(workspace) = &self.workspace {
            pairs.push(("workspace", workspace.clone()));
        }
        if let Some(offset) = &self.offset {
            pairs.push(("offset", offset.clone()));
        }
        if let Some(fields) = &self.opt_fields {
            pairs.push(("opt_fields", fields.clone()));
        }
        pairs
    }
}

#[async_trait]
pub trait AsanaApi: Send + Sync {
    async fn list_workspaces(&self, query: &ListQuery) -> Result<Page<Workspace>, ApiError>;

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, ApiError>;

    async fn list_projects(&self, query: &ListQuery) -> Result<Page<Project>, ApiError>;
}

#[derive(Clone)]
pub struct AsanaClient {
    http: Client,
    base_url: Url,
    token: String,
    retry: RetryPolicy,
}

impl fmt::Debug for AsanaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsanaClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl AsanaClient {
    pub fn new(base_url: Url, token: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent("asana-extractor/0.1")
            .no_proxy()
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self {
            http,
            base_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Append `resource` to the base path, keeping any prefix such as `/api/1.0`.
    pub fn endpoint(&self, resource: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource);
        }
        url
    }

    pub fn build_request(
        &self,
        resource: &str,
        query: &ListQuery,
    ) -> Result<reqwest::Request, ApiError> {
        self.http
            .get(self.endpoint(resource))
            .header("Authorization", format!("Bearer {}", self.token))
            .query(&query.pairs())
            .build()
            .map_err(ApiError::Transport)
    }

    async fn fetch_once<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        let request = self.build_request(resource, query)?;
        debug!(url = %request.url(), "sending asana request");
        let res = self
            .http
            .execute(request)
            .await
            .map_err(ApiError::Transport)?;

        let status = res.status();
        if status.is_success() {
            return res.json::<Page<T>>().await.map_err(|err| {
                if err.is_decode() {
                    ApiError::Decode(err)
                } else {
                    ApiError::Transport(err)
                }
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(res.headers());
            warn!(resource, ?retry_after, "rate limited by Asana");
            return Err(ApiError::RateLimited { retry_after });
        }

        let body = res.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorsResponse>(&body).unwrap_or_default();
        if status.is_server_error() {
            warn!(resource, %status, "asana server error");
            Err(ApiError::Server { status, detail })
        } else {
            Err(ApiError::client(status, detail))
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_page<T: DeserializeOwned + Send>(
        &self,
        resource: &'static str,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        let base_delay = self.retry.base_delay;
        retry(
            &self.retry,
            |err: &ApiError| err.retry_decision(base_delay),
            || self.fetch_once::<T>(resource, query),
        )
        .await
        .map_err(ApiError::from)
    }
}

#[async_trait]
impl AsanaApi for AsanaClient {
    async fn list_workspaces(&self, query: &ListQuery) -> Result<Page<Workspace>, ApiError> {
        self.fetch_page("workspaces", query).await
    }

    async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, ApiError> {
        self.fetch_page("users", query).await
    }

    async fn list_projects(&self, query: &ListQuery) -> Result<Page<Project>, ApiError> {
        self.fetch_page("projects", query).await
    }
}

/// `Retry-After` in delay-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client(base: &str) -> AsanaClient {
        AsanaClient::new(Url::parse(base).unwrap(), "token").unwrap()
    }

    #[test]
    fn endpoint_keeps_api_prefix() {
        let c = client(ASANA_API_BASE);
        assert_eq!(
            c.endpoint("users").as_str(),
            "https://app.asana.com/api/1.0/users"
        );

        let c = client("http://127.0.0.1:8080/");
        assert_eq!(c.endpoint("workspaces").path(), "/workspaces");
    }

    #[test]
    fn build_request_sets_auth_and_query() {
        let c = client(ASANA_API_BASE);
        let mut query = ListQuery::new(100).in_workspace("w1");
        query.offset = Some("abc".into());
        let request = c.build_request("projects", &query).unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/api/1.0/projects");
        assert_eq!(request.url().query(), Some("limit=100&workspace=w1&offset=abc"));
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer token"
        );
    }

    #[test]
    fn query_pairs_skip_unset_fields() {
        let query = ListQuery::new(50);
        assert_eq!(query.pairs(), vec![("limit", "50".to_string())]);

        let query = ListQuery::new(10).with_opt_fields("email,name");
        assert_eq!(query.pairs()[1], ("opt_fields", "email,name".to_string()));
    }

    #[test]
    fn retry_after_seconds_parsed() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn debug_hides_token() {
        let c = client(ASANA_API_BASE);
        let out = format!("{c:?}");
        assert!(!out.contains("token"));
    }
}
