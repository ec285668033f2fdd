use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::data_models::SearchResult;
use crate::error::SearchError;

/// Anything that turns a query into a ranked list of result pages.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Client for a SearXNG instance's JSON API.
#[derive(Debug, Clone)]
pub struct SearxngClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    // SearXNG puts the snippet under `content`.
    #[serde(default)]
    content: Option<String>,
}

/// Agents tend to wrap tool input in quotes.
pub fn normalize_query(input: &str) -> &str {
    let input = input.trim();
    let input = input.strip_prefix('"').unwrap_or(input);
    input.strip_suffix('"').unwrap_or(input)
}

impl SearxngClient {
    pub fn new(client: reqwest::Client, domain: &str, timeout: Duration) -> SearxngClient {
        SearxngClient {
            client,
            endpoint: format!("{}/", domain.trim().trim_end_matches('/')),
            timeout,
        }
    }

    #[cfg(test)]
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_body(body: &[u8]) -> Result<Vec<SearchResult>, SearchError> {
        let parsed: SearxngResponse =
            serde_json::from_slice(body).map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| {
                let url = r.url.filter(|u| !u.trim().is_empty())?;
                Some(SearchResult {
                    url,
                    title: r.title.unwrap_or_default(),
                    snippet: r.content.unwrap_or_default(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl SearchEngine for SearxngClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let query = normalize_query(query);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Network(format!("searxng returned HTTP {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let results = Self::parse_body(&body)?;
        log::info!("search found {} results for {query:?}", results.len());
        Ok(results)
    }
}
