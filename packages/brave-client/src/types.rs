use serde::Deserialize;

/// Top-level Brave web search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub web: Option<WebResults>,
}

/// The `web` section of a search response.
#[derive(Debug, Clone, Deserialize)]
pub struct WebResults {
    #[serde(default)]
    pub results: Vec<WebResult>,
}

/// A single ranked web result.
#[derive(Debug, Clone, Deserialize)]
pub struct WebResult {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}
