//! Token budgeting.
//!
//! Turns task characteristics into a total token budget and a share of it
//! per category. Pure and deterministic.
//!
//! # Total
//!
//! | Complexity | Base |
//! |------------|------|
//! | 1-3        | 2000 |
//! | 4-6        | 4000 |
//! | 7-10       | 6000 |
//! | other      | 4000 |
//!
//! then, each step truncating to whole tokens:
//! ×1.3 first-of-type, else ×1.15 with fewer than 3 similar tasks;
//! ×1.2 refinement; workflow tasks ×1.15 after turn 1 and ×1.10 with
//! previous turns.
//!
//! # Shares
//!
//! Start from the standard or the workflow table, apply the adjustments
//! for task type, phase, refinement or novelty (workflow: actor, turn,
//! refinement), then renormalize to 1.0.

use ctxforge_core::{Actor, Category, TaskCharacteristics, TaskPhase, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Total used whenever characteristics cannot be trusted.
pub const DEFAULT_TOTAL_TOKENS: usize = 4000;

/// Slack applied before flooring so renormalization drift never costs a token.
const FLOOR_EPSILON: f64 = 1e-9;

const STANDARD_ALLOCATION: [(Category, f64); 10] = [
    (Category::FeatureContext, 0.15),
    (Category::SimilarOutcomes, 0.25),
    (Category::RelevantPatterns, 0.20),
    (Category::ArchitectureContext, 0.20),
    (Category::Warnings, 0.15),
    (Category::DomainKnowledge, 0.05),
    (Category::RoleConstraints, 0.0),
    (Category::QualityGateConfigs, 0.0),
    (Category::TurnStates, 0.0),
    (Category::ImplementationModes, 0.0),
];

const WORKFLOW_ALLOCATION: [(Category, f64); 10] = [
    (Category::FeatureContext, 0.10),
    (Category::SimilarOutcomes, 0.15),
    (Category::RelevantPatterns, 0.15),
    (Category::ArchitectureContext, 0.10),
    (Category::Warnings, 0.10),
    (Category::DomainKnowledge, 0.05),
    (Category::RoleConstraints, 0.10),
    (Category::QualityGateConfigs, 0.10),
    (Category::TurnStates, 0.10),
    (Category::ImplementationModes, 0.05),
];

// ── Budget ────────────────────────────────────────────────────────────────

/// A token budget and its split across categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub total_tokens: usize,
    shares: BTreeMap<Category, f64>,
}

impl ContextBudget {
    /// Build a budget, normalizing `shares` to sum to 1.0.
    pub fn new(total_tokens: usize, shares: impl IntoIterator<Item = (Category, f64)>) -> Self {
        let mut shares: BTreeMap<Category, f64> = shares.into_iter().collect();
        normalize(&mut shares);
        Self {
            total_tokens,
            shares,
        }
    }

    /// 4000 tokens over the standard table.
    pub fn default_budget() -> Self {
        Self::new(DEFAULT_TOTAL_TOKENS, STANDARD_ALLOCATION)
    }

    /// Share of the total for `category`; 0.0 when absent.
    pub fn share(&self, category: Category) -> f64 {
        self.shares.get(&category).copied().unwrap_or(0.0)
    }

    /// Whole tokens allocated to `category`.
    pub fn allocation(&self, category: Category) -> usize {
        let share = self.share(category);
        if share <= 0.0 {
            return 0;
        }
        (self.total_tokens as f64 * share + FLOOR_EPSILON).floor() as usize
    }

    pub fn shares(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.shares.iter().map(|(c, s)| (*c, *s))
    }

    pub fn share_sum(&self) -> f64 {
        self.shares.values().sum()
    }
}

fn normalize(shares: &mut BTreeMap<Category, f64>) {
    let total: f64 = shares.values().sum();
    if total > 0.0 {
        for share in shares.values_mut() {
            *share /= total;
        }
    }
}

// ── Calculator ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetCalculator;

impl BudgetCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, c: &TaskCharacteristics) -> ContextBudget {
        let mut total = base_budget(c.complexity);
        total = adjust_for_novelty(total, c);
        if c.is_refinement {
            total = scale(total, 1.2);
        }
        if c.is_autobuild {
            total = adjust_for_workflow(total, c);
        }

        let shares = if c.is_autobuild {
            workflow_shares(c)
        } else {
            standard_shares(c)
        };
        ContextBudget::new(total, shares)
    }
}

pub fn base_budget(complexity: u8) -> usize {
    match complexity {
        1..=3 => 2000,
        4..=6 => 4000,
        7..=10 => 6000,
        _ => DEFAULT_TOTAL_TOKENS,
    }
}

fn scale(total: usize, factor: f64) -> usize {
    (total as f64 * factor) as usize
}

fn adjust_for_novelty(total: usize, c: &TaskCharacteristics) -> usize {
    if c.is_first_of_type {
        scale(total, 1.3)
    } else if c.similar_task_count < 3 {
        scale(total, 1.15)
    } else {
        total
    }
}

fn adjust_for_workflow(mut total: usize, c: &TaskCharacteristics) -> usize {
    if c.turn_number > 1 {
        total = scale(total, 1.15);
    }
    if c.has_previous_turns {
        total = scale(total, 1.10);
    }
    total
}

fn standard_shares(c: &TaskCharacteristics) -> BTreeMap<Category, f64> {
    use Category::*;
    let mut s: BTreeMap<Category, f64> = STANDARD_ALLOCATION.into_iter().collect();

    match c.task_type {
        TaskType::Review => {
            s.insert(RelevantPatterns, 0.30);
            s.insert(ArchitectureContext, 0.25);
            s.insert(SimilarOutcomes, 0.15);
        }
        TaskType::Planning => {
            s.insert(FeatureContext, 0.25);
            s.insert(ArchitectureContext, 0.30);
            s.insert(SimilarOutcomes, 0.15);
        }
        _ => {}
    }

    match c.current_phase {
        TaskPhase::Implement => {
            s.insert(RelevantPatterns, 0.30);
            s.insert(Warnings, 0.20);
        }
        TaskPhase::Test => {
            s.insert(SimilarOutcomes, 0.35);
        }
        _ => {}
    }

    if c.is_refinement {
        s.insert(Warnings, 0.35);
        s.insert(SimilarOutcomes, 0.30);
        s.insert(RelevantPatterns, 0.15);
        s.insert(ArchitectureContext, 0.10);
        s.insert(FeatureContext, 0.05);
        s.insert(DomainKnowledge, 0.05);
    } else if c.is_first_of_type {
        s.insert(ArchitectureContext, 0.30);
        s.insert(RelevantPatterns, 0.25);
    }

    s
}

fn workflow_shares(c: &TaskCharacteristics) -> BTreeMap<Category, f64> {
    use Category::*;
    let mut s: BTreeMap<Category, f64> = WORKFLOW_ALLOCATION.into_iter().collect();

    match c.current_actor {
        Some(Actor::Player) => {
            s.insert(RoleConstraints, 0.15);
            s.insert(ImplementationModes, 0.10);
        }
        Some(Actor::Coach) => {
            s.insert(RoleConstraints, 0.12);
            s.insert(QualityGateConfigs, 0.15);
        }
        None => {}
    }

    if c.turn_number > 1 {
        s.insert(TurnStates, 0.175);
        s.insert(SimilarOutcomes, 0.08);
        s.insert(FeatureContext, 0.08);
    }

    if c.is_refinement {
        s.insert(TurnStates, 0.20);
        s.insert(Warnings, 0.15);
        s.insert(SimilarOutcomes, 0.08);
    }

    s
}
