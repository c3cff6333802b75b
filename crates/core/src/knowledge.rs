//! Knowledge transport trait — the seam to the remote temporal knowledge graph.
//!
//! The graph service stores *episodes* (named text bodies filed under a
//! group) and answers searches with *facts*. Group ids handed to a
//! transport are always fully qualified; namespacing happens above this
//! layer in the gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// A single fact returned by the knowledge service.
///
/// Facts are immutable once retrieved: consumers filter and truncate
/// lists of them, never edit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Identifier assigned by the service.
    #[serde(alias = "uuid")]
    pub id: String,

    /// Short label of the edge or episode, when the service has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Free-form textual content.
    #[serde(alias = "fact", alias = "content")]
    pub body: String,

    /// Relevance score for the query that produced this fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_at: Option<DateTime<Utc>>,

    /// Structured attributes (e.g. `status`, `turns` on task outcomes).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Fact {
    /// Create a fact with just an id, body and score.
    pub fn new(id: impl Into<String>, body: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            id: id.into(),
            name: None,
            body: body.into(),
            score,
            created_at: None,
            valid_at: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Attach a name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a structured attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// The score, or `default` when the service did not provide one.
    pub fn score_or(&self, default: f64) -> f64 {
        self.score.unwrap_or(default)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn attribute_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(|v| v.as_f64())
    }
}

/// A search against the knowledge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,

    /// Qualified group ids to search. `None` searches every group.
    #[serde(default)]
    pub group_ids: Option<Vec<String>>,

    /// Maximum number of facts to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// An episode to file in the knowledge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    /// Body as sent on the wire (already carrying provenance metadata).
    pub body: String,
    /// Qualified group id.
    pub group_id: String,
    /// Logical time the episode refers to.
    pub reference_time: DateTime<Utc>,
}

/// The core transport trait.
///
/// Implementations: HTTP (the real service), in-memory (for testing and
/// offline use).
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// The transport name (e.g., "http", "in_memory").
    fn name(&self) -> &str;

    /// Search facts.
    async fn search(&self, request: SearchRequest) -> std::result::Result<Vec<Fact>, TransportError>;

    /// File an episode and return the id the service assigned.
    async fn add_episode(&self, episode: Episode) -> std::result::Result<String, TransportError>;

    /// Probe the service.
    async fn health_check(&self) -> std::result::Result<bool, TransportError> {
        Ok(true)
    }
}
