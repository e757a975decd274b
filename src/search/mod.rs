//! Web search used to answer questions the database cannot.

pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tavily::TavilyClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    /// Ask the provider to extract a direct answer from the results.
    pub include_answer: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: SearchDepth::Basic,
            include_answer: false,
        }
    }

    pub fn depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_answer(mut self) -> Self {
        self.include_answer = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable provider name, used in user-facing error text.
    fn name(&self) -> &'static str;

    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SearchError>;
}
