//! Task characterization.
//!
//! Classifies a work item and looks up similar historical work to decide
//! novelty and pull aggregate success statistics. Never fails: when the
//! knowledge service has nothing to say, documented defaults are used.

use async_trait::async_trait;
use ctxforge_core::{Actor, Fact, TaskCharacteristics, TaskPhase, TaskType, WorkItem};
use ctxforge_knowledge::KnowledgeClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fact must score strictly above this to count as similar work.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;
/// Average turns assumed when history has none.
pub const DEFAULT_AVG_TURNS: f64 = 3.0;
/// Success rate assumed when history has none.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.8;

const DEFAULT_TECH_STACK: &str = "python";
const DEFAULT_COMPLEXITY: u8 = 5;

/// Turns a work item into task characteristics.
#[async_trait]
pub trait TaskCharacterizer: Send + Sync {
    async fn analyze(&self, work: &WorkItem, phase: TaskPhase) -> TaskCharacteristics;
}

/// The standard characterizer, backed by the knowledge service.
pub struct TaskAnalyzer {
    client: Option<Arc<KnowledgeClient>>,
    search_limit: usize,
}

impl TaskAnalyzer {
    /// With no client, every task looks novel and gets default statistics.
    pub fn new(client: Option<Arc<KnowledgeClient>>) -> Self {
        Self {
            client,
            search_limit: 10,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Facts about similar past work. Searches every group.
    async fn query_history(&self, description: &str) -> Vec<Fact> {
        let Some(client) = &self.client else {
            return Vec::new();
        };
        match client.search(description, &[], self.search_limit).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(error = %e, "History lookup failed; treating task as novel");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl TaskCharacterizer for TaskAnalyzer {
    async fn analyze(&self, work: &WorkItem, phase: TaskPhase) -> TaskCharacteristics {
        let description = work.description.clone().unwrap_or_default();
        let history = self.query_history(&description).await;

        let similar_task_count = count_similar(&history);
        let (avg_turns_for_type, success_rate_for_type) = performance(&history);
        let refinement_attempt = work.refinement_attempt.unwrap_or(0);

        let current_actor = match work.current_actor.as_deref() {
            None => Some(Actor::Player),
            Some(raw) => raw.parse().ok(),
        };

        let characteristics = TaskCharacteristics {
            task_id: work.id.clone().unwrap_or_default(),
            description,
            tech_stack: work
                .tech_stack
                .clone()
                .unwrap_or_else(|| DEFAULT_TECH_STACK.into()),
            task_type: TaskType::classify(work.task_type.as_deref()),
            current_phase: phase,
            complexity: work.complexity.unwrap_or(DEFAULT_COMPLEXITY),
            is_first_of_type: similar_task_count == 0,
            similar_task_count,
            feature_id: work.feature_id.clone(),
            is_refinement: refinement_attempt > 0,
            refinement_attempt,
            previous_failure_type: work.last_failure_type.clone(),
            avg_turns_for_type,
            success_rate_for_type,
            current_actor,
            turn_number: work.turn_number.unwrap_or(0),
            is_autobuild: work.is_autobuild,
            has_previous_turns: work.has_previous_turns,
        };

        debug!(
            task_id = %characteristics.task_id,
            task_type = ?characteristics.task_type,
            complexity = characteristics.complexity,
            similar = similar_task_count,
            refinement = characteristics.is_refinement,
            "Analyzed task"
        );
        characteristics
    }
}

/// Facts scoring above [`SIMILARITY_THRESHOLD`]; a missing score is 0.
fn count_similar(history: &[Fact]) -> usize {
    history
        .iter()
        .filter(|f| f.score_or(0.0) > SIMILARITY_THRESHOLD)
        .count()
}

/// Average turns over facts that carry them; success rate over every
/// outcome once any carries a status.
fn performance(history: &[Fact]) -> (f64, f64) {
    let turns: Vec<f64> = history.iter().filter_map(|f| f.attribute_f64("turns")).collect();
    let statuses: Vec<&str> = history.iter().filter_map(|f| f.attribute_str("status")).collect();

    let avg_turns = if turns.is_empty() {
        DEFAULT_AVG_TURNS
    } else {
        turns.iter().sum::<f64>() / turns.len() as f64
    };

    let success_rate = if statuses.is_empty() {
        DEFAULT_SUCCESS_RATE
    } else {
        statuses.iter().filter(|s| **s == "success").count() as f64 / history.len() as f64
    };

    (avg_turns, success_rate)
}
