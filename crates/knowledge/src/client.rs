//! The knowledge client — namespace-isolated access to the graph service.
//!
//! Every operation comes in two forms:
//! - `try_*` returns `Result<_, KnowledgeError>` and reports exactly what
//!   went wrong.
//! - the plain form applies the degrade policy: transient failures become
//!   an empty list or `None`, configuration errors are still returned.

use chrono::{DateTime, Utc};
use ctxforge_core::error::{ConfigError, KnowledgeError, TransportError};
use ctxforge_core::knowledge::{Episode, Fact, GraphTransport, SearchRequest};
use ctxforge_core::{Category, Namespace, Scope};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::groups::{qualify_category, qualify_group, qualify_group_as, qualify_groups};

/// Value of `_metadata.source` on recorded episodes.
pub const PROVENANCE_SOURCE: &str = "ctxforge";
/// Value of `_metadata.schema_version` on recorded episodes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Result of [`KnowledgeClient::episode_exists`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeMatch {
    pub found: bool,
    /// The stored episode carries the same content hash.
    pub exact_match: bool,
    pub fact_id: Option<String>,
}

pub struct KnowledgeClient {
    transport: Option<Arc<dyn GraphTransport>>,
    namespace: Option<Namespace>,
    enabled: bool,
    connected: AtomicBool,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl KnowledgeClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// A client over `transport`. Not connected until
    /// [`Self::initialize`] succeeds; until then every call degrades.
    pub fn new(transport: Arc<dyn GraphTransport>, namespace: Option<Namespace>) -> Self {
        Self {
            transport: Some(transport),
            namespace,
            enabled: true,
            connected: AtomicBool::new(false),
            breaker: CircuitBreaker::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// A client that was switched off by configuration.
    pub fn disabled(namespace: Option<Namespace>) -> Self {
        Self {
            transport: None,
            namespace,
            enabled: false,
            connected: AtomicBool::new(false),
            breaker: CircuitBreaker::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// An enabled client with no usable transport (missing credentials,
    /// transport not compiled in, client construction failed).
    pub fn unconnected(namespace: Option<Namespace>, reason: &str) -> Self {
        warn!(reason, "Knowledge service unavailable; continuing without knowledge graph context");
        Self {
            transport: None,
            namespace,
            enabled: true,
            connected: AtomicBool::new(false),
            breaker: CircuitBreaker::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.breaker = CircuitBreaker::new(max_failures);
        self
    }

    /// Probe the service and record whether it answered.
    pub async fn initialize(&self) -> bool {
        let Some(transport) = self.transport.as_ref().filter(|_| self.enabled) else {
            return false;
        };

        let ok = match tokio::time::timeout(self.timeout, transport.health_check()).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                warn!(transport = transport.name(), "Knowledge service health check failed");
                false
            }
            Ok(Err(e)) => {
                warn!(transport = transport.name(), error = %e, "Knowledge service unreachable");
                false
            }
            Err(_) => {
                warn!(
                    transport = transport.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Knowledge service health check timed out"
                );
                false
            }
        };

        self.connected.store(ok, Ordering::Release);
        if ok {
            info!(
                transport = transport.name(),
                namespace = self.namespace.as_ref().map(Namespace::as_str),
                "Connected to knowledge service"
            );
        }
        ok
    }

    /// Enabled, connected and not tripped.
    pub fn healthy(&self) -> bool {
        self.enabled && self.is_connected() && !self.breaker.is_open()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some() && self.connected.load(Ordering::Acquire)
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn transport_name(&self) -> Option<&str> {
        self.transport.as_deref().map(|t| t.name())
    }

    // --- Search ---

    /// Search the given categories. An empty list searches every group.
    pub async fn try_search(
        &self,
        query: &str,
        categories: &[Category],
        limit: usize,
    ) -> Result<Vec<Fact>, KnowledgeError> {
        let group_ids = qualify_groups(self.namespace.as_ref(), categories)?;
        self.run_search(query, group_ids, limit).await
    }

    pub async fn search(
        &self,
        query: &str,
        categories: &[Category],
        limit: usize,
    ) -> Result<Vec<Fact>, ConfigError> {
        degrade("search", self.try_search(query, categories, limit).await)
    }

    /// Search raw group names, classifying each by name.
    ///
    /// Already-qualified names (another tenant's, by explicit request) are
    /// passed through.
    pub async fn try_search_groups(
        &self,
        query: &str,
        groups: &[&str],
        limit: usize,
    ) -> Result<Vec<Fact>, KnowledgeError> {
        let group_ids = groups
            .iter()
            .map(|g| qualify_group(self.namespace.as_ref(), g))
            .collect::<Result<Vec<_>, _>>()?;
        self.run_search(query, non_empty(group_ids), limit).await
    }

    pub async fn search_groups(
        &self,
        query: &str,
        groups: &[&str],
        limit: usize,
    ) -> Result<Vec<Fact>, ConfigError> {
        degrade("search_groups", self.try_search_groups(query, groups, limit).await)
    }

    /// Search raw group names under an explicit scope.
    pub async fn search_with_scope(
        &self,
        query: &str,
        groups: &[&str],
        scope: Scope,
        limit: usize,
    ) -> Result<Vec<Fact>, ConfigError> {
        let result: Result<Vec<Fact>, KnowledgeError> = async {
            let group_ids = groups
                .iter()
                .map(|g| qualify_group_as(self.namespace.as_ref(), g, scope))
                .collect::<Result<Vec<_>, _>>()?;
            self.run_search(query, non_empty(group_ids), limit).await
        }
        .await;
        degrade("search_with_scope", result)
    }

    async fn run_search(
        &self,
        query: &str,
        group_ids: Option<Vec<String>>,
        limit: usize,
    ) -> Result<Vec<Fact>, KnowledgeError> {
        let request = SearchRequest {
            query: query.to_string(),
            group_ids,
            limit,
        };
        self.call(move |t| async move { t.search(request).await })
            .await
    }

    // --- Record ---

    /// File `body` under `category`, wrapped with provenance metadata.
    pub async fn try_record(
        &self,
        name: &str,
        body: &str,
        category: Category,
    ) -> Result<String, KnowledgeError> {
        self.try_record_entity(name, body, category, None).await
    }

    /// Like [`Self::try_record`], tagging the episode with an entity id so
    /// it can later be found by [`Self::episode_exists`].
    pub async fn try_record_entity(
        &self,
        name: &str,
        body: &str,
        category: Category,
        entity_id: Option<&str>,
    ) -> Result<String, KnowledgeError> {
        let group_id = qualify_category(self.namespace.as_ref(), category)?;
        let now = Utc::now();
        let episode = Episode {
            name: name.to_string(),
            body: with_provenance(body, category, entity_id, now),
            group_id,
            reference_time: now,
        };
        self.call(move |t| async move { t.add_episode(episode).await })
            .await
    }

    pub async fn record(
        &self,
        name: &str,
        body: &str,
        category: Category,
    ) -> Result<Option<String>, ConfigError> {
        degrade("record", self.try_record(name, body, category).await.map(Some))
    }

    pub async fn record_entity(
        &self,
        name: &str,
        body: &str,
        category: Category,
        entity_id: Option<&str>,
    ) -> Result<Option<String>, ConfigError> {
        let result = self
            .try_record_entity(name, body, category, entity_id)
            .await
            .map(Some);
        degrade("record", result)
    }

    /// Look for a previously recorded episode about `entity_id`.
    ///
    /// With `source_hash`, a stored episode carrying the same content hash
    /// is preferred and reported as an exact match.
    pub async fn episode_exists(
        &self,
        entity_id: &str,
        category: Category,
        source_hash: Option<&str>,
    ) -> Result<EpisodeMatch, ConfigError> {
        let facts = self.search(entity_id, &[category], 10).await?;

        let mentions = |f: &Fact| {
            f.attribute_str("entity_id") == Some(entity_id)
                || f.body.contains(entity_id)
                || f.name.as_deref().is_some_and(|n| n.contains(entity_id))
        };
        let same_hash = |f: &Fact| {
            source_hash.is_some_and(|h| {
                f.attribute_str("content_hash") == Some(h) || f.body.contains(h)
            })
        };

        let candidates: Vec<&Fact> = facts.iter().filter(|f| mentions(f)).collect();
        let best = candidates
            .iter()
            .find(|f| same_hash(f))
            .or_else(|| candidates.first());

        Ok(match best {
            Some(fact) => EpisodeMatch {
                found: true,
                exact_match: same_hash(fact),
                fact_id: Some(fact.id.clone()),
            },
            None => EpisodeMatch::default(),
        })
    }

    /// Run one remote operation through the state checks, the timeout and
    /// the breaker.
    async fn call<T, F, Fut>(&self, op: F) -> Result<T, KnowledgeError>
    where
        F: FnOnce(Arc<dyn GraphTransport>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        if !self.enabled {
            return Err(KnowledgeError::Disabled);
        }
        if self.breaker.is_open() {
            return Err(KnowledgeError::CircuitOpen {
                failures: self.breaker.failures(),
            });
        }
        let transport = match &self.transport {
            Some(t) if self.connected.load(Ordering::Acquire) => Arc::clone(t),
            _ => return Err(KnowledgeError::NotConnected),
        };

        match tokio::time::timeout(self.timeout, op(transport)).await {
            Ok(Ok(value)) => {
                self.breaker.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                Err(e.into())
            }
            Err(_) => {
                self.breaker.record_failure();
                Err(TransportError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
                .into())
            }
        }
    }
}

impl std::fmt::Debug for KnowledgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeClient")
            .field("transport", &self.transport_name())
            .field("namespace", &self.namespace)
            .field("enabled", &self.enabled)
            .field("connected", &self.is_connected())
            .field("breaker", &self.breaker)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Apply the degrade policy: configuration errors surface, everything
/// else becomes the empty value.
fn degrade<T: Default>(op: &'static str, result: Result<T, KnowledgeError>) -> Result<T, ConfigError> {
    match result {
        Ok(value) => Ok(value),
        Err(KnowledgeError::Config(e)) => Err(e),
        Err(e) => {
            debug!(op, error = %e, "Knowledge call degraded to empty result");
            Ok(T::default())
        }
    }
}

fn non_empty(groups: Vec<String>) -> Option<Vec<String>> {
    (!groups.is_empty()).then_some(groups)
}

/// Hex SHA-256 of `body`.
pub fn content_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Wrap `body` with a `_metadata` object.
///
/// A JSON object body gets the key added in place; anything else is
/// stored under `content`.
fn with_provenance(
    body: &str,
    category: Category,
    entity_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> String {
    let mut metadata = Map::new();
    metadata.insert("source".into(), json!(PROVENANCE_SOURCE));
    metadata.insert("schema_version".into(), json!(SCHEMA_VERSION));
    metadata.insert("created_at".into(), json!(created_at.to_rfc3339()));
    metadata.insert("content_hash".into(), json!(content_hash(body)));
    metadata.insert("category".into(), json!(category.group_name()));
    if let Some(id) = entity_id {
        metadata.insert("entity_id".into(), json!(id));
    }

    let mut document = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("content".into(), json!(body));
            map
        }
    };
    document.insert("_metadata".into(), Value::Object(metadata));
    Value::Object(document).to_string()
}
