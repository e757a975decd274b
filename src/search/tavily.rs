//! Tavily search API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{SearchDepth, SearchError, SearchProvider, SearchRequest, SearchResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: reqwest::Client,
    base_url: String,
}

impl TavilyClient {
    /// Create from `TAVILY_API_KEY`, `TAVILY_BASE_URL`, `TAVILY_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self, SearchError> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| SearchError::Config("TAVILY_API_KEY not set".into()))?;

        let base_url =
            std::env::var("TAVILY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let timeout = std::env::var("TAVILY_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        Self::with_config(api_key, base_url, timeout)
    }

    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| SearchError::Config("Invalid API key format".into()))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SearchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[derive(Serialize)]
struct SearchApiRequest<'a> {
    query: &'a str,
    search_depth: SearchDepth,
    include_answer: bool,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    detail: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Message { error: String },
    Text(String),
}

#[async_trait]
impl SearchProvider for TavilyClient {
    fn name(&self) -> &'static str {
        "Tavily"
    }

    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let body = SearchApiRequest {
            query: &req.query,
            search_depth: req.depth,
            include_answer: req.include_answer,
        };

        let response = self.client.post(self.search_url()).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.detail)
                .map(|d| match d {
                    ApiErrorDetail::Message { error } => error,
                    ApiErrorDetail::Text(t) => t,
                })
                .unwrap_or_else(|| text.trim().to_string());
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| SearchError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_wire_names() {
        let body = SearchApiRequest {
            query: "capital of France",
            search_depth: SearchDepth::Advanced,
            include_answer: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "query": "capital of France",
                "search_depth": "advanced",
                "include_answer": true
            })
        );
    }

    #[test]
    fn error_detail_accepts_object_or_string() {
        let a: ApiErrorBody = serde_json::from_str(r#"{"detail":{"error":"bad key"}}"#).unwrap();
        assert!(matches!(a.detail, Some(ApiErrorDetail::Message { ref error }) if error == "bad key"));
        let b: ApiErrorBody = serde_json::from_str(r#"{"detail":"quota"}"#).unwrap();
        assert!(matches!(b.detail, Some(ApiErrorDetail::Text(ref t)) if t == "quota"));
    }
}
