//! # ctxforge Core
//!
//! Domain types, traits, and error definitions for the ctxforge context engine.
//! This crate has **no runtime dependencies**: it defines the domain model
//! that the knowledge gateway and the retrieval pipeline implement against.
//!
//! ## Layout
//!
//! - [`category`]: the closed set of knowledge categories and their scopes
//! - [`namespace`]: validated tenant namespaces
//! - [`knowledge`]: facts, episodes and the [`GraphTransport`] seam
//! - [`task`]: work items and analyzed task characteristics
//! - [`error`]: the error taxonomy

pub mod category;
pub mod error;
pub mod knowledge;
pub mod namespace;
pub mod task;

// Re-export key types at crate root for ergonomics
pub use category::{Category, Scope, SHARED_GROUP_PREFIX};
pub use error::{ConfigError, Error, KnowledgeError, Result, TransportError};
pub use knowledge::{Episode, Fact, GraphTransport, SearchRequest};
pub use namespace::{NAMESPACE_DELIMITER, Namespace};
pub use task::{Actor, TaskCharacteristics, TaskPhase, TaskType, WorkItem};
