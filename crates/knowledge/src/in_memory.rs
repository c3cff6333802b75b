//! In-memory transport — useful for testing and offline runs.

use async_trait::async_trait;
use chrono::Utc;
use ctxforge_core::error::TransportError;
use ctxforge_core::knowledge::{Episode, Fact, GraphTransport, SearchRequest};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredFact {
    group_id: String,
    fact: Fact,
}

/// A transport that keeps facts in a Vec.
///
/// Facts seeded with [`InMemoryTransport::insert`] keep the score they were
/// given. Facts created from episodes are scored by the fraction of query
/// terms they contain.
pub struct InMemoryTransport {
    facts: Arc<RwLock<Vec<StoredFact>>>,
    episodes: Arc<RwLock<Vec<Episode>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            facts: Arc::new(RwLock::new(Vec::new())),
            episodes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed a fact into a (qualified) group.
    pub async fn insert(&self, group_id: impl Into<String>, fact: Fact) {
        self.facts.write().await.push(StoredFact {
            group_id: group_id.into(),
            fact,
        });
    }

    /// Every episode filed so far, in order.
    pub async fn episodes(&self) -> Vec<Episode> {
        self.episodes.read().await.clone()
    }

    /// Number of stored facts.
    pub async fn len(&self) -> usize {
        self.facts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.facts.read().await.is_empty()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of query terms present in `text`; 1.0 for an empty query.
fn keyword_score(query: &str, text: &str) -> f64 {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return 1.0;
    }
    let text = text.to_lowercase();
    let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

#[async_trait]
impl GraphTransport for InMemoryTransport {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Fact>, TransportError> {
        let facts = self.facts.read().await;

        let mut results: Vec<Fact> = facts
            .iter()
            .filter(|s| {
                request
                    .group_ids
                    .as_ref()
                    .is_none_or(|groups| groups.contains(&s.group_id))
            })
            .filter_map(|s| {
                let mut fact = s.fact.clone();
                if fact.score.is_none() {
                    let haystack = match &fact.name {
                        Some(name) => format!("{name} {}", fact.body),
                        None => fact.body.clone(),
                    };
                    let score = keyword_score(&request.query, &haystack);
                    if score == 0.0 {
                        return None;
                    }
                    fact.score = Some(score);
                }
                Some(fact)
            })
            .collect();

        results.sort_by(|a, b| {
            b.score_or(0.0)
                .partial_cmp(&a.score_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(request.limit);

        Ok(results)
    }

    async fn add_episode(&self, episode: Episode) -> Result<String, TransportError> {
        let id = Uuid::new_v4().to_string();
        let fact = Fact {
            id: id.clone(),
            name: Some(episode.name.clone()),
            body: episode.body.clone(),
            score: None,
            created_at: Some(Utc::now()),
            valid_at: Some(episode.reference_time),
            attributes: serde_json::Map::new(),
        };
        self.facts.write().await.push(StoredFact {
            group_id: episode.group_id.clone(),
            fact,
        });
        self.episodes.write().await.push(episode);
        Ok(id)
    }
}
