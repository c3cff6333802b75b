//! Relevance policy and retrieval-quality metrics.

use ctxforge_config::RelevanceSettings;
use ctxforge_core::{Category, ConfigError, TaskCharacteristics};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;

// ── Policy ────────────────────────────────────────────────────────────────

/// Minimum fact scores, by kind of task.
///
/// All four thresholds are validated to lie in `[0.0, 1.0]` on
/// construction; there is no way to build an out-of-range policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceConfig {
    first_of_type: f64,
    standard: f64,
    refinement: f64,
    autobuild: f64,
}

impl RelevanceConfig {
    pub fn new(
        first_of_type: f64,
        standard: f64,
        refinement: f64,
        autobuild: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            first_of_type,
            standard,
            refinement,
            autobuild,
        };
        for (name, value) in config.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(config)
    }

    pub fn from_settings(settings: &RelevanceSettings) -> Result<Self, ConfigError> {
        Self::new(
            settings.first_of_type_threshold,
            settings.standard_threshold,
            settings.refinement_threshold,
            settings.autobuild_threshold,
        )
    }

    /// Higher bars for every kind of task.
    pub fn strict() -> Self {
        Self {
            first_of_type: 0.65,
            standard: 0.75,
            refinement: 0.65,
            autobuild: 0.6,
        }
    }

    /// Lower bars: more context, more noise.
    pub fn relaxed() -> Self {
        Self {
            first_of_type: 0.4,
            standard: 0.45,
            refinement: 0.35,
            autobuild: 0.35,
        }
    }

    pub fn first_of_type_threshold(&self) -> f64 {
        self.first_of_type
    }

    pub fn standard_threshold(&self) -> f64 {
        self.standard
    }

    pub fn refinement_threshold(&self) -> f64 {
        self.refinement
    }

    pub fn autobuild_threshold(&self) -> f64 {
        self.autobuild
    }

    /// The threshold for a task: workflow, then first-of-type, then
    /// refinement, then standard.
    pub fn threshold(&self, c: &TaskCharacteristics) -> f64 {
        if c.is_autobuild {
            self.autobuild
        } else if c.is_first_of_type {
            self.first_of_type
        } else if c.is_refinement {
            self.refinement
        } else {
            self.standard
        }
    }

    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("first_of_type", self.first_of_type),
            ("standard", self.standard),
            ("refinement", self.refinement),
            ("autobuild", self.autobuild),
        ]
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            first_of_type: 0.5,
            standard: 0.6,
            refinement: 0.55,
            autobuild: 0.5,
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────

/// Quality of one retrieval.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextQualityMetrics {
    pub avg_relevance_score: f64,
    pub total_items_retrieved: usize,
    pub items_above_threshold: usize,
    pub items_below_threshold: usize,
    /// Tokens used over tokens allocated, per category.
    pub category_coverage: BTreeMap<Category, f64>,
    /// Tokens used over the total budget.
    pub budget_utilization: f64,
}

impl ContextQualityMetrics {
    /// Fraction of retrieved items at or above the threshold.
    pub fn relevance_rate(&self) -> f64 {
        if self.total_items_retrieved == 0 {
            return 0.0;
        }
        self.items_above_threshold as f64 / self.total_items_retrieved as f64
    }

    pub fn is_quality_acceptable(&self, min_relevance_rate: f64) -> bool {
        self.relevance_rate() >= min_relevance_rate
    }
}

impl Serialize for ContextQualityMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ContextQualityMetrics", 7)?;
        s.serialize_field("avg_relevance_score", &self.avg_relevance_score)?;
        s.serialize_field("total_items_retrieved", &self.total_items_retrieved)?;
        s.serialize_field("items_above_threshold", &self.items_above_threshold)?;
        s.serialize_field("items_below_threshold", &self.items_below_threshold)?;
        s.serialize_field("category_coverage", &self.category_coverage)?;
        s.serialize_field("budget_utilization", &self.budget_utilization)?;
        s.serialize_field("relevance_rate", &self.relevance_rate())?;
        s.end()
    }
}

/// Accumulates observations for one retrieval call.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    threshold: f64,
    total_budget: usize,
    category_budgets: BTreeMap<Category, usize>,
    scores: Vec<(Category, f64)>,
    category_tokens: BTreeMap<Category, usize>,
    tokens_used: usize,
}

impl MetricsCollector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    pub fn with_total_budget(mut self, total: usize) -> Self {
        self.total_budget = total;
        self
    }

    pub fn with_category_budgets(
        mut self,
        budgets: impl IntoIterator<Item = (Category, usize)>,
    ) -> Self {
        self.category_budgets = budgets.into_iter().collect();
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Record one retrieved item.
    pub fn add_result(&mut self, category: Category, score: f64) {
        self.scores.push((category, score));
    }

    /// Record tokens accepted into a category.
    pub fn add_category_usage(&mut self, category: Category, tokens: usize) {
        *self.category_tokens.entry(category).or_default() += tokens;
    }

    pub fn add_budget_usage(&mut self, tokens: usize) {
        self.tokens_used += tokens;
    }

    pub fn get_metrics(&self) -> ContextQualityMetrics {
        let total = self.scores.len();
        let above = self
            .scores
            .iter()
            .filter(|(_, score)| *score >= self.threshold)
            .count();
        let avg = if total == 0 {
            0.0
        } else {
            self.scores.iter().map(|(_, s)| s).sum::<f64>() / total as f64
        };

        let mut coverage: BTreeMap<Category, f64> = BTreeMap::new();
        let touched = self
            .category_budgets
            .keys()
            .chain(self.category_tokens.keys())
            .chain(self.scores.iter().map(|(c, _)| c));
        for category in touched {
            let budget = self.category_budgets.get(category).copied().unwrap_or(0);
            let used = self.category_tokens.get(category).copied().unwrap_or(0);
            let ratio = if budget == 0 {
                0.0
            } else {
                used as f64 / budget as f64
            };
            coverage.insert(*category, ratio);
        }

        let budget_utilization = if self.total_budget == 0 {
            0.0
        } else {
            self.tokens_used as f64 / self.total_budget as f64
        };

        ContextQualityMetrics {
            avg_relevance_score: avg,
            total_items_retrieved: total,
            items_above_threshold: above,
            items_below_threshold: total - above,
            category_coverage: coverage,
            budget_utilization,
        }
    }

    /// Forget every observation; budgets and threshold are kept.
    pub fn reset(&mut self) {
        self.scores.clear();
        self.category_tokens.clear();
        self.tokens_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RelevanceConfig::default();
        assert_eq!(config.first_of_type_threshold(), 0.5);
        assert_eq!(config.standard_threshold(), 0.6);
        assert_eq!(config.refinement_threshold(), 0.55);
        assert_eq!(config.autobuild_threshold(), 0.5);
        assert_eq!(
            RelevanceConfig::from_settings(&RelevanceSettings::default()).unwrap(),
            config
        );
    }

    #[test]
    fn out_of_range_fails_construction() {
        let err = RelevanceConfig::new(-0.1, 0.6, 0.55, 0.5).unwrap_err();
        assert!(err.to_string().contains("threshold must be between 0.0 and 1.0"));
        assert!(RelevanceConfig::new(0.5, 1.1, 0.55, 0.5).is_err());
        assert!(RelevanceConfig::new(0.5, 0.6, f64::NAN, 0.5).is_err());
        assert!(RelevanceConfig::new(0.0, 1.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn threshold_priority() {
        let config = RelevanceConfig::default();
        let base = TaskCharacteristics::default();
        assert_eq!(config.threshold(&base), 0.6);

        let refine = TaskCharacteristics {
            is_refinement: true,
            ..base.clone()
        };
        assert_eq!(config.threshold(&refine), 0.55);

        let first = TaskCharacteristics {
            is_first_of_type: true,
            ..refine.clone()
        };
        assert_eq!(config.threshold(&first), 0.5);

        let workflow = TaskCharacteristics {
            is_autobuild: true,
            ..first
        };
        assert_eq!(config.threshold(&workflow), 0.5);

        let strict = RelevanceConfig::strict();
        assert_eq!(strict.threshold(&workflow), 0.6);
        assert_eq!(strict.threshold(&refine), 0.65);
    }

    #[test]
    fn presets_are_valid() {
        for preset in [RelevanceConfig::strict(), RelevanceConfig::relaxed()] {
            let rebuilt = RelevanceConfig::new(
                preset.first_of_type_threshold(),
                preset.standard_threshold(),
                preset.refinement_threshold(),
                preset.autobuild_threshold(),
            );
            assert_eq!(rebuilt.unwrap(), preset);
        }
        assert!(RelevanceConfig::relaxed().standard_threshold() < RelevanceConfig::strict().standard_threshold());
    }

    #[test]
    fn relevance_rate_handles_empty() {
        let metrics = ContextQualityMetrics::default();
        assert_eq!(metrics.relevance_rate(), 0.0);
        assert!(!metrics.is_quality_acceptable(0.7));
    }

    #[test]
    fn acceptable_quality_is_inclusive() {
        let metrics = ContextQualityMetrics {
            total_items_retrieved: 10,
            items_above_threshold: 7,
            items_below_threshold: 3,
            ..Default::default()
        };
        assert!(metrics.is_quality_acceptable(0.7));
        assert!(!metrics.is_quality_acceptable(0.75));
    }

    #[test]
    fn collector_counts_against_threshold() {
        let mut collector = MetricsCollector::new(0.5);
        collector.add_result(Category::FeatureContext, 0.8);
        collector.add_result(Category::FeatureContext, 0.5);
        collector.add_result(Category::SimilarOutcomes, 0.4);
        collector.add_result(Category::Warnings, 0.9);

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_items_retrieved, 4);
        assert_eq!(metrics.items_above_threshold, 3);
        assert_eq!(metrics.items_below_threshold, 1);
        assert!((metrics.avg_relevance_score - 0.65).abs() < 1e-9);
        assert_eq!(metrics.relevance_rate(), 0.75);
    }

    #[test]
    fn coverage_and_utilization() {
        let mut collector = MetricsCollector::new(0.5)
            .with_total_budget(1000)
            .with_category_budgets([(Category::FeatureContext, 200), (Category::Warnings, 100)]);
        collector.add_result(Category::FeatureContext, 0.9);
        collector.add_category_usage(Category::FeatureContext, 80);
        collector.add_budget_usage(80);

        let metrics = collector.get_metrics();
        assert_eq!(metrics.category_coverage[&Category::FeatureContext], 0.4);
        assert_eq!(metrics.category_coverage[&Category::Warnings], 0.0);
        assert_eq!(metrics.budget_utilization, 0.08);
    }

    #[test]
    fn reset_clears_observations() {
        let mut collector = MetricsCollector::new(0.5).with_total_budget(100);
        collector.add_result(Category::FeatureContext, 0.9);
        collector.add_budget_usage(50);
        collector.reset();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_items_retrieved, 0);
        assert_eq!(metrics.items_above_threshold, 0);
        assert_eq!(metrics.budget_utilization, 0.0);
        assert_eq!(collector.threshold(), 0.5);
    }

    #[test]
    fn serialized_metrics_include_relevance_rate() {
        let metrics = ContextQualityMetrics {
            avg_relevance_score: 0.75,
            total_items_retrieved: 10,
            items_above_threshold: 8,
            items_below_threshold: 2,
            category_coverage: BTreeMap::from([(Category::FeatureContext, 0.8)]),
            budget_utilization: 0.85,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["relevance_rate"], 0.8);
        assert_eq!(json["category_coverage"]["feature_context"], 0.8);
    }
}
