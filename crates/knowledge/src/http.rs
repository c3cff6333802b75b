//! HTTP transport for the knowledge-graph service.
//!
//! Endpoints:
//! - `POST {base}/search` → `{ "facts": [...] }`
//! - `POST {base}/episodes` → `{ "uuid": "..." }`
//! - `GET  {base}/healthcheck`

use async_trait::async_trait;
use ctxforge_core::error::TransportError;
use ctxforge_core::knowledge::{Episode, Fact, GraphTransport, SearchRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpTransport {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "Knowledge service returned error");
        Err(TransportError::Api {
            status_code: status.as_u16(),
            message: body,
        })
    }
}

#[derive(Serialize)]
struct ApiSearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_ids: Option<&'a [String]>,
    max_facts: usize,
}

#[derive(Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    facts: Vec<Fact>,
}

#[derive(Serialize)]
struct ApiEpisode<'a> {
    name: &'a str,
    episode_body: &'a str,
    group_id: &'a str,
    reference_time: String,
}

#[derive(Deserialize)]
struct ApiEpisodeResponse {
    #[serde(alias = "id")]
    uuid: String,
}

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

#[async_trait]
impl GraphTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Fact>, TransportError> {
        let url = format!("{}/search", self.base_url);
        let body = ApiSearchRequest {
            query: &request.query,
            group_ids: request.group_ids.as_deref(),
            max_facts: request.limit,
        };

        debug!(groups = ?request.group_ids, limit = request.limit, "Sending search request");

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        let response = Self::check_status(response).await?;

        let parsed: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(parsed.facts)
    }

    async fn add_episode(&self, episode: Episode) -> Result<String, TransportError> {
        let url = format!("{}/episodes", self.base_url);
        let body = ApiEpisode {
            name: &episode.name,
            episode_body: &episode.body,
            group_id: &episode.group_id,
            reference_time: episode.reference_time.to_rfc3339(),
        };

        debug!(group = %episode.group_id, name = %episode.name, "Sending episode");

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        let response = Self::check_status(response).await?;

        let parsed: ApiEpisodeResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(parsed.uuid)
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        let url = format!("{}/healthcheck", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(network)?;

        Ok(response.status().is_success())
    }
}
