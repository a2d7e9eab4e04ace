use crate::core::{CrmSource, Deal, Page, PageRequest, Pipeline};
use crate::utils::error::{ReportError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const PIPELINES_PATH: &str = "/crm/v3/pipelines/deals";
pub const DEALS_PATH: &str = "/crm/v3/objects/deals";

#[derive(Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    after: String,
}

/// Bearer-authenticated GET access to the CRM REST API. Stateless apart from
/// the credential; retries are left to callers.
#[derive(Debug, Clone)]
pub struct CrmClient {
    client: Client,
    settings: ApiSettings,
}

impl CrmClient {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("deal-report/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.settings.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, path, &body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ReportError::Decode {
            message: format!("{}: {}", path, e),
        })
    }

    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &PageRequest,
    ) -> Result<Page<T>> {
        let response: ListResponse<T> = self.get_json(path, &request.query_pairs()).await?;

        Ok(Page {
            results: response.results,
            next_cursor: response
                .paging
                .and_then(|p| p.next)
                .map(|n| n.after)
                .filter(|after| !after.is_empty()),
        })
    }
}

#[async_trait]
impl CrmSource for CrmClient {
    async fn pipelines(&self) -> Result<Vec<Pipeline>> {
        let response: ListResponse<Pipeline> = self.get_json(PIPELINES_PATH, &[]).await?;
        Ok(response.results)
    }

    async fn deal_page(&self, request: &PageRequest) -> Result<Page<Deal>> {
        self.get_page(DEALS_PATH, request).await
    }
}

/// Maps a non-2xx status to the error taxonomy, keeping the CRM's own message when it sent one.
fn status_error(status: StatusCode, path: &str, body: &str) -> ReportError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("no response body").to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReportError::Authentication {
            status: status.as_u16(),
            message,
        },
        StatusCode::NOT_FOUND => ReportError::NotFound {
            resource: path.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => ReportError::Transient {
            message: format!("rate limited on {}: {}", path, message),
        },
        s if s.is_server_error() => ReportError::Transient {
            message: format!("HTTP {} on {}: {}", s.as_u16(), path, message),
        },
        s => ReportError::Request {
            status: Some(s.as_u16()),
            message,
        },
    }
}
