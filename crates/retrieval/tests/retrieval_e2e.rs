//! End-to-end retrieval through the gateway and an in-memory graph.

use async_trait::async_trait;
use ctxforge_config::RetrievalConfig;
use ctxforge_core::{
    Category, Episode, Fact, GraphTransport, Namespace, SearchRequest, TaskCharacteristics,
    TaskPhase, TransportError, WorkItem,
};
use ctxforge_knowledge::{InMemoryTransport, KnowledgeClient};
use ctxforge_retrieval::{
    BudgetCalculator, JobContextRetriever, RelevanceConfig, TaskCharacterizer,
};
use std::sync::{Arc, Mutex};

/// Characterizer returning fixed characteristics.
struct Fixed(TaskCharacteristics);

#[async_trait]
impl TaskCharacterizer for Fixed {
    async fn analyze(&self, _work: &WorkItem, _phase: TaskPhase) -> TaskCharacteristics {
        self.0.clone()
    }
}

/// In-memory graph that errors for one group and counts searches.
struct FailingGroup {
    inner: InMemoryTransport,
    failing: String,
    searches: Mutex<usize>,
}

#[async_trait]
impl GraphTransport for FailingGroup {
    fn name(&self) -> &str {
        "failing-group"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Fact>, TransportError> {
        *self.searches.lock().unwrap() += 1;
        let hits_failing = request
            .group_ids
            .as_ref()
            .is_some_and(|groups| groups.contains(&self.failing));
        if hits_failing {
            return Err(TransportError::Network("connection reset".into()));
        }
        self.inner.search(request).await
    }

    async fn add_episode(&self, episode: Episode) -> Result<String, TransportError> {
        self.inner.add_episode(episode).await
    }
}

fn ns() -> Option<Namespace> {
    Some(Namespace::new("proj").unwrap())
}

async fn connected(transport: Arc<dyn GraphTransport>) -> Arc<KnowledgeClient> {
    let client = KnowledgeClient::new(transport, ns());
    assert!(client.initialize().await);
    Arc::new(client)
}

async fn retriever_over(transport: Arc<dyn GraphTransport>, c: TaskCharacteristics) -> JobContextRetriever {
    let client = connected(transport).await;
    JobContextRetriever::new(client, RelevanceConfig::default(), &RetrievalConfig::default())
        .unwrap()
        .with_characterizer(Arc::new(Fixed(c)))
}

/// Complexity 5, enough history, standard implementation task.
fn standard_task() -> TaskCharacteristics {
    TaskCharacteristics {
        task_id: "TASK-A".into(),
        description: "add login".into(),
        complexity: 5,
        is_first_of_type: false,
        similar_task_count: 5,
        ..Default::default()
    }
}

fn work() -> WorkItem {
    WorkItem::new("TASK-A", "add login")
}

#[tokio::test]
async fn standard_task_gets_base_budget() {
    let c = standard_task();
    let budget = BudgetCalculator::new().calculate(&c);
    assert_eq!(budget.total_tokens, 4000);
    assert_eq!(budget.allocation(Category::FeatureContext), 600);

    let transport = Arc::new(InMemoryTransport::new());
    let context = retriever_over(transport, c).await.retrieve(&work(), TaskPhase::Load).await;
    assert_eq!(context.budget_total, 4000);
    assert_eq!(context.budget_used, 0);
    assert_eq!(context.sections.len(), 6);
}

#[tokio::test]
async fn novel_complex_task_gets_larger_budget() {
    let c = TaskCharacteristics {
        complexity: 9,
        is_first_of_type: true,
        similar_task_count: 0,
        ..standard_task()
    };
    assert_eq!(BudgetCalculator::new().calculate(&c).total_tokens, 7800);

    let transport = Arc::new(InMemoryTransport::new());
    let context = retriever_over(transport, c).await.retrieve(&work(), TaskPhase::Load).await;
    assert_eq!(context.budget_total, 7800);
}

#[tokio::test]
async fn failing_category_is_isolated() {
    let inner = InMemoryTransport::new();
    inner
        .insert("proj__feature_specs", Fact::new("f1", "login form spec", Some(0.9)))
        .await;
    inner
        .insert("proj__failure_patterns", Fact::new("w1", "session fixation", Some(0.9)))
        .await;
    let transport = Arc::new(FailingGroup {
        inner,
        failing: "proj__task_outcomes".into(),
        searches: Mutex::new(0),
    });

    let retriever = retriever_over(transport.clone(), standard_task()).await;
    let context = retriever.retrieve(&work(), TaskPhase::Load).await;

    assert!(context.facts(Category::SimilarOutcomes).is_empty());
    assert_eq!(context.facts(Category::FeatureContext).len(), 1);
    assert_eq!(context.facts(Category::Warnings).len(), 1);
    assert_eq!(context.budget_used, 7 + 8);
    assert_eq!(*transport.searches.lock().unwrap(), 6);
    assert!(!retriever.client().breaker().is_open());
}

#[tokio::test]
async fn greedy_trim_never_skips_ahead() {
    // complexity 2 with history: 2000 total, domain knowledge 5% = 100
    let c = TaskCharacteristics {
        complexity: 2,
        ..standard_task()
    };
    let budget = BudgetCalculator::new().calculate(&c);
    assert_eq!(budget.allocation(Category::DomainKnowledge), 100);

    let transport = Arc::new(InMemoryTransport::new());
    for (id, chars) in [("first", 120), ("second", 120), ("small", 20)] {
        transport
            .insert("proj__domain_knowledge", Fact::new(id, "d".repeat(chars), Some(0.9)))
            .await;
    }

    let context = retriever_over(transport, c).await.retrieve(&work(), TaskPhase::Load).await;
    let accepted = context.facts(Category::DomainKnowledge);
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, "first");
    assert_eq!(context.budget_used, 60);
    assert_eq!(context.quality_metrics.category_coverage[&Category::DomainKnowledge], 0.6);
}

#[tokio::test]
async fn workflow_tasks_query_shared_groups() {
    let c = TaskCharacteristics {
        is_autobuild: true,
        ..standard_task()
    };
    let transport = Arc::new(InMemoryTransport::new());
    transport
        .insert("role_constraints", Fact::new("r1", "player writes code", Some(0.9)))
        .await;
    transport
        .insert("proj__turn_states", Fact::new("t1", "turn 1 failed lint", Some(0.9)))
        .await;
    transport
        .insert("other__turn_states", Fact::new("leak", "another tenant", Some(0.9)))
        .await;

    let context = retriever_over(transport, c).await.retrieve(&work(), TaskPhase::Load).await;
    assert_eq!(context.sections.len(), 10);
    assert_eq!(context.facts(Category::RoleConstraints)[0].id, "r1");
    assert_eq!(context.facts(Category::TurnStates).len(), 1);
    assert_eq!(context.facts(Category::TurnStates)[0].id, "t1");
}

#[tokio::test]
async fn malformed_characteristics_fall_back_to_defaults() {
    let c = TaskCharacteristics {
        complexity: 9,
        is_first_of_type: true,
        avg_turns_for_type: f64::NAN,
        ..standard_task()
    };
    let transport = Arc::new(InMemoryTransport::new());
    // passes the first-of-type threshold but not the standard one
    transport
        .insert("proj__feature_specs", Fact::new("f1", "spec", Some(0.55)))
        .await;

    let context = retriever_over(transport, c).await.retrieve(&work(), TaskPhase::Load).await;
    assert_eq!(context.budget_total, 4000);
    assert!(context.facts(Category::FeatureContext).is_empty());
    assert_eq!(context.quality_metrics.items_below_threshold, 1);
}

#[tokio::test]
async fn history_backed_analysis_end_to_end() {
    let transport = Arc::new(InMemoryTransport::new());
    for i in 0..3 {
        transport
            .insert(
                "proj__task_outcomes",
                Fact::new(format!("o{i}"), "add login succeeded", Some(0.9)),
            )
            .await;
    }
    let client = connected(transport).await;
    let retriever =
        JobContextRetriever::new(client, RelevanceConfig::default(), &RetrievalConfig::default())
            .unwrap();

    let item = WorkItem {
        complexity: Some(5),
        ..work()
    };
    let context = retriever.retrieve(&item, TaskPhase::Load).await;

    // three similar tasks: no novelty boost
    assert_eq!(context.budget_total, 4000);
    assert_eq!(context.facts(Category::SimilarOutcomes).len(), 3);
    assert!(context.quality_metrics.is_quality_acceptable(0.7));
    assert!(context.to_prompt().contains("### Similar Outcomes"));
}

#[test]
fn budget_grows_with_context_needs() {
    let calc = BudgetCalculator::new();
    for complexity in 1..=10 {
        let base = TaskCharacteristics {
            complexity,
            ..standard_task()
        };
        let first = TaskCharacteristics {
            is_first_of_type: true,
            similar_task_count: 0,
            ..base.clone()
        };
        let refine = TaskCharacteristics {
            is_refinement: true,
            refinement_attempt: 1,
            ..first.clone()
        };
        let later_turn = TaskCharacteristics {
            is_autobuild: true,
            turn_number: 3,
            has_previous_turns: true,
            ..refine.clone()
        };

        let totals: Vec<usize> = [&base, &first, &refine, &later_turn]
            .iter()
            .map(|c| calc.calculate(c).total_tokens)
            .collect();
        assert!(totals.windows(2).all(|w| w[0] <= w[1]), "{totals:?}");

        for c in [&base, &first, &refine, &later_turn] {
            assert!((calc.calculate(c).share_sum() - 1.0).abs() < 1e-9);
        }
    }
}
