//! Budget-bounded context retrieval for ctxforge.
//!
//! One call to [`JobContextRetriever::retrieve`] runs the whole pipeline:
//!
//! 1. [`TaskAnalyzer`] turns a work item into [`TaskCharacteristics`](ctxforge_core::TaskCharacteristics)
//! 2. [`BudgetCalculator`] derives a token budget and per-category shares
//! 3. [`RelevanceConfig`] picks the minimum score worth keeping
//! 4. each category is queried, filtered and trimmed to its allocation
//!
//! The result is a [`RetrievedContext`] that renders straight into a prompt.

pub mod analyzer;
pub mod budget;
pub mod relevance;
pub mod retriever;
pub mod token;

pub use analyzer::{TaskAnalyzer, TaskCharacterizer};
pub use budget::{BudgetCalculator, ContextBudget};
pub use relevance::{ContextQualityMetrics, MetricsCollector, RelevanceConfig};
pub use retriever::{JobContextRetriever, RetrievedContext};
