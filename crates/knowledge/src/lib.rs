//! Knowledge Service Gateway for ctxforge.
//!
//! The only part of the system that talks to the remote knowledge graph.
//! Every call goes through a [`KnowledgeClient`], which qualifies group
//! names with the tenant namespace, bounds each call with a timeout and
//! guards the transport with a [`CircuitBreaker`].
//!
//! Clients are never shared across execution contexts; obtain one per
//! context from a [`ClientFactory`].

pub mod breaker;
pub mod client;
pub mod factory;
pub mod groups;
#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;

pub use breaker::CircuitBreaker;
pub use client::{EpisodeMatch, KnowledgeClient};
pub use factory::{ClientFactory, TransportBuilder};
pub use groups::{qualify_category, qualify_group, qualify_groups};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use in_memory::InMemoryTransport;
