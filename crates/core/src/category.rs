//! Knowledge categories — the named slices of the knowledge graph.
//!
//! Every category carries its storage group name and its [`Scope`] at
//! definition time. Tenant-scoped groups are stored under a per-project
//! prefix (`{project}__{group}`); shared groups are visible to every tenant
//! and never prefixed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Group names beginning with this prefix are always shared.
pub const SHARED_GROUP_PREFIX: &str = "shared_";

/// Whether a group belongs to one tenant or to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Stored under the tenant's namespace prefix.
    Tenant,
    /// Stored unprefixed, visible to every tenant.
    Shared,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tenant => write!(f, "tenant"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// A knowledge category.
///
/// The declaration order is the order sections appear in a rendered
/// context bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    // Standard retrieval categories
    FeatureContext,
    SimilarOutcomes,
    RelevantPatterns,
    ArchitectureContext,
    Warnings,
    DomainKnowledge,

    // Agent-workflow categories
    RoleConstraints,
    QualityGateConfigs,
    TurnStates,
    ImplementationModes,

    // Record/search only
    ProjectOverview,
    ProjectDecisions,
    ProjectConstraints,
    Templates,
    SharedPatterns,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 15] = [
        Self::FeatureContext,
        Self::SimilarOutcomes,
        Self::RelevantPatterns,
        Self::ArchitectureContext,
        Self::Warnings,
        Self::DomainKnowledge,
        Self::RoleConstraints,
        Self::QualityGateConfigs,
        Self::TurnStates,
        Self::ImplementationModes,
        Self::ProjectOverview,
        Self::ProjectDecisions,
        Self::ProjectConstraints,
        Self::Templates,
        Self::SharedPatterns,
    ];

    /// Categories queried for every retrieval.
    pub const STANDARD: [Category; 6] = [
        Self::FeatureContext,
        Self::SimilarOutcomes,
        Self::RelevantPatterns,
        Self::ArchitectureContext,
        Self::Warnings,
        Self::DomainKnowledge,
    ];

    /// Categories queried only for agent-workflow (player/coach) tasks.
    pub const WORKFLOW: [Category; 4] = [
        Self::RoleConstraints,
        Self::QualityGateConfigs,
        Self::TurnStates,
        Self::ImplementationModes,
    ];

    /// The unqualified storage group name.
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::FeatureContext => "feature_specs",
            Self::SimilarOutcomes => "task_outcomes",
            Self::RelevantPatterns => "patterns",
            Self::ArchitectureContext => "project_architecture",
            Self::Warnings => "failure_patterns",
            Self::DomainKnowledge => "domain_knowledge",
            Self::RoleConstraints => "role_constraints",
            Self::QualityGateConfigs => "quality_gate_configs",
            Self::TurnStates => "turn_states",
            Self::ImplementationModes => "implementation_modes",
            Self::ProjectOverview => "project_overview",
            Self::ProjectDecisions => "project_decisions",
            Self::ProjectConstraints => "project_constraints",
            Self::Templates => "shared_templates",
            Self::SharedPatterns => "shared_patterns",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::RoleConstraints
            | Self::QualityGateConfigs
            | Self::ImplementationModes
            | Self::Templates
            | Self::SharedPatterns => Scope::Shared,
            _ => Scope::Tenant,
        }
    }

    pub fn is_tenant_scoped(&self) -> bool {
        self.scope() == Scope::Tenant
    }

    /// Human-readable section title used when rendering.
    pub fn title(&self) -> &'static str {
        match self {
            Self::FeatureContext => "Feature Context",
            Self::SimilarOutcomes => "Similar Outcomes",
            Self::RelevantPatterns => "Relevant Patterns",
            Self::ArchitectureContext => "Architecture Context",
            Self::Warnings => "Warnings",
            Self::DomainKnowledge => "Domain Knowledge",
            Self::RoleConstraints => "Role Constraints",
            Self::QualityGateConfigs => "Quality Gate Configs",
            Self::TurnStates => "Turn States",
            Self::ImplementationModes => "Implementation Modes",
            Self::ProjectOverview => "Project Overview",
            Self::ProjectDecisions => "Project Decisions",
            Self::ProjectConstraints => "Project Constraints",
            Self::Templates => "Templates",
            Self::SharedPatterns => "Shared Patterns",
        }
    }

    /// Look up a category by its exact (case-sensitive) group name.
    pub fn from_group_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.group_name() == name)
    }

    /// Classify a raw group name.
    ///
    /// Known groups use their declared scope, names carrying the shared
    /// prefix are shared, and anything else is tenant-scoped.
    pub fn scope_of_group(name: &str) -> Scope {
        match Self::from_group_name(name) {
            Some(category) => category.scope(),
            None if name.starts_with(SHARED_GROUP_PREFIX) => Scope::Shared,
            None => Scope::Tenant,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_groups_are_classified_tenant() {
        for name in [
            "project_overview",
            "project_architecture",
            "feature_specs",
            "project_decisions",
            "project_constraints",
            "domain_knowledge",
        ] {
            assert_eq!(Category::scope_of_group(name), Scope::Tenant, "{name}");
        }
    }

    #[test]
    fn shared_groups_are_classified_shared() {
        for name in [
            "role_constraints",
            "quality_gate_configs",
            "implementation_modes",
            "shared_templates",
            "shared_patterns",
        ] {
            assert_eq!(Category::scope_of_group(name), Scope::Shared, "{name}");
        }
    }

    #[test]
    fn unknown_groups_default_to_tenant() {
        assert_eq!(Category::scope_of_group("custom_group"), Scope::Tenant);
        assert_eq!(Category::scope_of_group("my_feature_data"), Scope::Tenant);
    }

    #[test]
    fn shared_prefix_always_means_shared() {
        assert_eq!(Category::scope_of_group("shared_anything"), Scope::Shared);
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(Category::scope_of_group("Role_Constraints"), Scope::Tenant);
        assert_eq!(Category::scope_of_group("PROJECT_OVERVIEW"), Scope::Tenant);
    }

    #[test]
    fn group_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_group_name(category.group_name()), Some(category));
        }
    }

    #[test]
    fn standard_and_workflow_sets_are_disjoint() {
        for c in Category::WORKFLOW {
            assert!(!Category::STANDARD.contains(&c));
        }
    }
}
