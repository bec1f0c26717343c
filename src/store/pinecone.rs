use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Document, VectorStore};
use crate::config::PineconeConfig;

/// Read-only handle on an existing Pinecone index.
pub struct PineconeIndex {
    host: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Debug, Deserialize)]
struct ScoredVector {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

impl PineconeIndex {
    /// Opens the configured index, asking the controller for its host unless
    /// one is configured.
    pub async fn connect(config: &PineconeConfig) -> Result<Self> {
        let client = Client::new();

        let host = match &config.index_host {
            Some(host) => host.clone(),
            None => {
                let url = format!(
                    "{}/indexes/{}",
                    config.controller_url.trim_end_matches('/'),
                    config.index
                );
                info!("Resolving Pinecone index `{}` via {}", config.index, url);

                let response = client
                    .get(&url)
                    .header("Api-Key", &config.api_key)
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach Pinecone controller at {}", url))?;
                if !response.status().is_success() {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(anyhow!(
                        "Pinecone describe_index failed ({}): {}",
                        status,
                        error_text
                    ));
                }
                response.json::<IndexDescription>().await?.host
            }
        };

        info!(
            "Using Pinecone index `{}` ({}) at {}",
            config.index, config.environment, host
        );

        Ok(Self::with_host(&host, &config.api_key, client))
    }

    pub fn with_host(host: &str, api_key: &str, client: Client) -> Self {
        Self {
            host: with_scheme(host),
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn similarity_search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<Document>> {
        let request = QueryRequest {
            vector: &vector,
            top_k,
            include_metadata: true,
            filter: filter.as_ref(),
        };
        debug!("Pinecone query top_k={} filter={:?}", top_k, filter);

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Pinecone query failed ({}): {}", status, error_text));
        }

        let body: QueryResponse = response.json().await?;
        for m in &body.matches {
            debug!("Match {} score {:.3}", m.id, m.score);
        }

        Ok(body
            .matches
            .into_iter()
            .map(|m| Document::from_metadata(m.metadata.unwrap_or_default()))
            .collect())
    }
}
