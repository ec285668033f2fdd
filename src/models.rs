use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ModelListError;

/// Lists the model names a client may pass as `modelname`.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, ModelListError>;
}

#[derive(Debug, Clone)]
pub struct OllamaModelCatalog {
    client: reqwest::Client,
    host: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaModelCatalog {
    pub fn new(client: reqwest::Client, host: &str) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelCatalog for OllamaModelCatalog {
    async fn list_models(&self) -> Result<Vec<String>, ModelListError> {
        let res = self
            .client
            .get(format!("{}/api/tags", self.host))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ModelListError::Status(res.status()));
        }
        let tags: TagsResponse = res.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
