//! Job context retrieval — the pipeline root.
//!
//! Each call characterizes the work, budgets it, then fans out one gateway
//! query per applicable category. Results are filtered by the relevance
//! threshold and greedily trimmed to the category's token allocation.
//! The call itself never fails; a failing category comes back empty.

use ctxforge_config::RetrievalConfig;
use ctxforge_core::{Category, ConfigError, Fact, TaskCharacteristics, TaskPhase, WorkItem};
use ctxforge_knowledge::KnowledgeClient;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzer::{TaskAnalyzer, TaskCharacterizer};
use crate::budget::{BudgetCalculator, ContextBudget};
use crate::relevance::{ContextQualityMetrics, MetricsCollector, RelevanceConfig};
use crate::token::estimate_fact_tokens;

/// Score assumed for a fact the service returned without one.
const MISSING_SCORE: f64 = 1.0;

// ── Result ────────────────────────────────────────────────────────────────

/// The context bundle for one unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    pub task_id: String,
    pub budget_used: usize,
    pub budget_total: usize,
    /// Accepted facts for every queried category, in rendering order.
    pub sections: BTreeMap<Category, Vec<Fact>>,
    pub quality_metrics: ContextQualityMetrics,
}

impl RetrievedContext {
    /// Facts accepted for `category`; empty when it was not queried.
    pub fn facts(&self, category: Category) -> &[Fact] {
        self.sections.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fact_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fact_count() == 0
    }

    /// Prompt-ready rendering: a header, the budget line, then one section
    /// per non-empty category.
    pub fn to_prompt(&self) -> String {
        let mut out = String::from("## Job-Specific Context\n\n");
        let _ = writeln!(out, "Budget: {}/{} tokens", self.budget_used, self.budget_total);

        for (category, facts) in &self.sections {
            if facts.is_empty() {
                continue;
            }
            let _ = write!(out, "\n### {}\n", category.title());
            for fact in facts {
                match fact.name.as_deref() {
                    Some(name) if !name.is_empty() => {
                        let _ = writeln!(out, "- {}: {}", name, fact.body);
                    }
                    _ => {
                        let _ = writeln!(out, "- {}", fact.body);
                    }
                }
            }
        }
        out
    }
}

// ── Retriever ─────────────────────────────────────────────────────────────

/// Produces one budget-bounded context bundle per call.
///
/// Holds no per-call state; the client it wraps belongs to the caller's
/// execution context.
pub struct JobContextRetriever {
    client: Arc<KnowledgeClient>,
    characterizer: Arc<dyn TaskCharacterizer>,
    calculator: BudgetCalculator,
    relevance: RelevanceConfig,
    search_limit: usize,
}

/// What one category query produced.
struct CategoryOutcome {
    category: Category,
    scores: Vec<f64>,
    accepted: Vec<Fact>,
    tokens: usize,
}

impl JobContextRetriever {
    /// Fails when the client has no tenant namespace: every standard
    /// category is tenant-scoped and could never be addressed.
    pub fn new(
        client: Arc<KnowledgeClient>,
        relevance: RelevanceConfig,
        retrieval: &RetrievalConfig,
    ) -> Result<Self, ConfigError> {
        if client.namespace().is_none() {
            return Err(ConfigError::MissingNamespace {
                group: Category::FeatureContext.group_name().to_string(),
            });
        }

        let characterizer = TaskAnalyzer::new(Some(Arc::clone(&client)))
            .with_search_limit(retrieval.search_limit);

        Ok(Self {
            client,
            characterizer: Arc::new(characterizer),
            calculator: BudgetCalculator::new(),
            relevance,
            search_limit: retrieval.search_limit,
        })
    }

    /// Replace the default history-backed characterizer.
    pub fn with_characterizer(mut self, characterizer: Arc<dyn TaskCharacterizer>) -> Self {
        self.characterizer = characterizer;
        self
    }

    pub fn relevance_config(&self) -> &RelevanceConfig {
        &self.relevance
    }

    pub fn client(&self) -> &Arc<KnowledgeClient> {
        &self.client
    }

    pub async fn retrieve(&self, work: &WorkItem, phase: TaskPhase) -> RetrievedContext {
        let characteristics = self.characterizer.analyze(work, phase).await;
        let (budget, threshold) = self.plan(&characteristics);

        let categories = categories_for(&characteristics);
        let queries = categories.iter().map(|&category| {
            self.query_category(
                category,
                &characteristics.description,
                budget.allocation(category),
                threshold,
            )
        });
        let outcomes = join_all(queries).await;

        let mut metrics = MetricsCollector::new(threshold)
            .with_total_budget(budget.total_tokens)
            .with_category_budgets(categories.iter().map(|&c| (c, budget.allocation(c))));
        let mut sections = BTreeMap::new();
        let mut budget_used = 0;

        for outcome in outcomes {
            for score in &outcome.scores {
                metrics.add_result(outcome.category, *score);
            }
            metrics.add_category_usage(outcome.category, outcome.tokens);
            metrics.add_budget_usage(outcome.tokens);
            budget_used += outcome.tokens;
            sections.insert(outcome.category, outcome.accepted);
        }

        let quality_metrics = metrics.get_metrics();
        info!(
            task_id = %characteristics.task_id,
            budget_used,
            budget_total = budget.total_tokens,
            threshold,
            categories = categories.len(),
            relevance_rate = quality_metrics.relevance_rate(),
            "Retrieved job context"
        );

        RetrievedContext {
            task_id: characteristics.task_id,
            budget_used,
            budget_total: budget.total_tokens,
            sections,
            quality_metrics,
        }
    }

    /// Budget and threshold for the task, or safe defaults when its
    /// statistics are unusable.
    fn plan(&self, c: &TaskCharacteristics) -> (ContextBudget, f64) {
        if !c.is_well_formed() {
            warn!(
                task_id = %c.task_id,
                avg_turns = c.avg_turns_for_type,
                success_rate = c.success_rate_for_type,
                "Malformed task characteristics; using default budget"
            );
            return (ContextBudget::default_budget(), self.relevance.standard_threshold());
        }
        (self.calculator.calculate(c), self.relevance.threshold(c))
    }

    async fn query_category(
        &self,
        category: Category,
        query: &str,
        allocation: usize,
        threshold: f64,
    ) -> CategoryOutcome {
        let results = match self
            .client
            .try_search(query, &[category], self.search_limit)
            .await
        {
            Ok(facts) => facts,
            Err(e) => {
                debug!(category = %category.group_name(), error = %e, "Category query failed");
                Vec::new()
            }
        };

        let scores: Vec<f64> = results.iter().map(|f| f.score_or(MISSING_SCORE)).collect();
        let relevant: Vec<Fact> = results
            .into_iter()
            .filter(|f| f.score_or(MISSING_SCORE) >= threshold)
            .collect();
        let (accepted, tokens) = trim_to_budget(relevant, allocation);

        if accepted.is_empty() {
            debug!(category = %category.group_name(), retrieved = scores.len(), "No context for category");
        }

        CategoryOutcome {
            category,
            scores,
            accepted,
            tokens,
        }
    }
}

impl std::fmt::Debug for JobContextRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContextRetriever")
            .field("client", &self.client)
            .field("relevance", &self.relevance)
            .field("search_limit", &self.search_limit)
            .finish_non_exhaustive()
    }
}

/// The six standard categories, plus the workflow ones for workflow tasks.
fn categories_for(c: &TaskCharacteristics) -> Vec<Category> {
    let mut categories = Category::STANDARD.to_vec();
    if c.is_autobuild {
        categories.extend(Category::WORKFLOW);
    }
    categories
}

/// Accept facts in order until the next one would overflow `budget`.
///
/// Stops at the first overflow even when a later, smaller fact would fit.
pub fn trim_to_budget(facts: Vec<Fact>, budget: usize) -> (Vec<Fact>, usize) {
    let mut used = 0;
    let mut accepted = Vec::new();
    for fact in facts {
        let tokens = estimate_fact_tokens(&fact);
        if used + tokens > budget {
            break;
        }
        used += tokens;
        accepted.push(fact);
    }
    (accepted, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxforge_core::Namespace;
    use ctxforge_knowledge::InMemoryTransport;

    fn fact(id: &str, chars: usize, score: Option<f64>) -> Fact {
        Fact::new(id, "x".repeat(chars), score)
    }

    fn ids(facts: &[Fact]) -> Vec<&str> {
        facts.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn trim_stops_at_first_overflow() {
        let facts = vec![fact("a", 120, None), fact("b", 120, None), fact("c", 20, None)];
        let (accepted, used) = trim_to_budget(facts, 100);
        assert_eq!(ids(&accepted), vec!["a"]);
        assert_eq!(used, 60);
    }

    #[test]
    fn trim_accepts_exact_fit() {
        let facts = vec![fact("a", 100, None), fact("b", 100, None)];
        let (accepted, used) = trim_to_budget(facts, 100);
        assert_eq!(accepted.len(), 2);
        assert_eq!(used, 100);
    }

    #[test]
    fn zero_allocation_accepts_nothing() {
        let (accepted, used) = trim_to_budget(vec![fact("a", 1, None)], 0);
        assert!(accepted.is_empty());
        assert_eq!(used, 0);
    }

    #[test]
    fn workflow_adds_four_categories() {
        let mut c = TaskCharacteristics::default();
        assert_eq!(categories_for(&c).len(), 6);
        c.is_autobuild = true;
        let all = categories_for(&c);
        assert_eq!(all.len(), 10);
        assert!(all.contains(&Category::TurnStates));
    }

    #[test]
    fn prompt_lists_non_empty_sections() {
        let context = RetrievedContext {
            task_id: "TASK-1".into(),
            budget_used: 42,
            budget_total: 4000,
            sections: BTreeMap::from([
                (Category::Warnings, vec![Fact::new("w", "Do not mock the DB", None)]),
                (
                    Category::FeatureContext,
                    vec![Fact::new("f", "OAuth2 login", None).with_name("FEAT-7")],
                ),
                (Category::DomainKnowledge, vec![]),
            ]),
            quality_metrics: ContextQualityMetrics::default(),
        };

        let prompt = context.to_prompt();
        assert!(prompt.starts_with("## Job-Specific Context"));
        assert!(prompt.contains("Budget: 42/4000 tokens"));
        assert!(prompt.contains("### Feature Context\n- FEAT-7: OAuth2 login"));
        assert!(prompt.contains("### Warnings\n- Do not mock the DB"));
        assert!(!prompt.contains("Domain Knowledge"));
        // declaration order, not insertion order
        assert!(prompt.find("Feature Context") < prompt.find("Warnings"));
    }

    #[test]
    fn new_requires_a_namespace() {
        let client = Arc::new(KnowledgeClient::new(Arc::new(InMemoryTransport::new()), None));
        let err = JobContextRetriever::new(client, RelevanceConfig::default(), &RetrievalConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingNamespace { .. }));
    }

    #[tokio::test]
    async fn filters_below_threshold_and_keeps_unscored() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.insert("proj__feature_specs", fact("hi", 10, Some(0.9))).await;
        transport.insert("proj__feature_specs", fact("lo", 10, Some(0.2))).await;
        transport.insert("proj__failure_patterns", Fact::new("raw", "x", None)).await;

        let client = KnowledgeClient::new(transport, Some(Namespace::new("proj").unwrap()));
        assert!(client.initialize().await);
        let retriever = JobContextRetriever::new(
            Arc::new(client),
            RelevanceConfig::default(),
            &RetrievalConfig::default(),
        )
        .unwrap();

        let context = retriever.retrieve(&WorkItem::new("T-1", "x"), TaskPhase::Load).await;
        assert_eq!(ids(context.facts(Category::FeatureContext)), vec!["hi"]);
        assert_eq!(ids(context.facts(Category::Warnings)), vec!["raw"]);
        assert_eq!(context.task_id, "T-1");
        assert_eq!(context.quality_metrics.items_below_threshold, 1);
        assert!(context.facts(Category::TurnStates).is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_yields_empty_bundle() {
        let client = KnowledgeClient::unconnected(Some(Namespace::new("proj").unwrap()), "down");
        let retriever = JobContextRetriever::new(
            Arc::new(client),
            RelevanceConfig::default(),
            &RetrievalConfig::default(),
        )
        .unwrap();

        let context = retriever.retrieve(&WorkItem::new("T-1", "x"), TaskPhase::Load).await;
        assert!(context.is_empty());
        assert_eq!(context.budget_used, 0);
        assert!(context.budget_total > 0);
        assert!(context.to_prompt().contains("Budget: 0/"));
    }
}
