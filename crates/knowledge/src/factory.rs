//! Client factory — one knowledge client per execution context.
//!
//! Clients hold a connection and circuit-breaker state, so they are never
//! handed from one execution context (thread, worker, task-processing
//! unit) to another. The factory builds clients lazily, keyed by a
//! caller-chosen context key, and health-checks each new client's health once.

use ctxforge_config::KnowledgeConfig;
use ctxforge_core::error::{ConfigError, TransportError};
use ctxforge_core::knowledge::GraphTransport;
use ctxforge_core::Namespace;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::client::KnowledgeClient;

/// Builds the transport for a new client.
pub type TransportBuilder =
    Arc<dyn Fn(&KnowledgeConfig) -> Result<Arc<dyn GraphTransport>, TransportError> + Send + Sync>;

type Slot = Arc<OnceCell<Arc<KnowledgeClient>>>;

pub struct ClientFactory {
    config: KnowledgeConfig,
    namespace: Option<Namespace>,
    builder: TransportBuilder,
    clients: Mutex<HashMap<String, Slot>>,
}

impl ClientFactory {
    /// A factory using the default transport for this build.
    pub fn new(config: KnowledgeConfig, namespace: Option<Namespace>) -> Self {
        Self {
            config,
            namespace,
            builder: default_builder(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the namespace for `cwd` and build a factory.
    pub fn from_config(config: KnowledgeConfig, cwd: &Path) -> Result<Self, ConfigError> {
        let namespace = config.resolve_namespace(cwd)?;
        Ok(Self::new(config, namespace))
    }

    pub fn with_transport_builder(mut self, builder: TransportBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Build a fresh, uninitialized client. `None` when the service is
    /// disabled by configuration.
    pub fn create_client(&self) -> Option<KnowledgeClient> {
        if !self.config.enabled {
            return None;
        }

        let namespace = self.namespace.clone();
        let client = if !self.config.has_credentials() {
            KnowledgeClient::unconnected(namespace, "api key required but not configured")
        } else {
            match (self.builder)(&self.config) {
                Ok(transport) => KnowledgeClient::new(transport, namespace),
                Err(e) => KnowledgeClient::unconnected(namespace, &e.to_string()),
            }
        };

        Some(
            client
                .with_timeout(self.config.timeout())
                .with_max_failures(self.config.max_failures),
        )
    }

    /// The client for `context_key`, creating and initializing it on
    /// first use.
    pub async fn client_for(&self, context_key: &str) -> Option<Arc<KnowledgeClient>> {
        if !self.config.enabled {
            return None;
        }

        let slot = {
            let mut clients = self.clients.lock().await;
            Arc::clone(clients.entry(context_key.to_string()).or_default())
        };

        let client = slot
            .get_or_try_init(|| async {
                let client = Arc::new(self.create_client().ok_or(())?);
                client.initialize().await;
                debug!(context = context_key, healthy = client.healthy(), "Created knowledge client");
                Ok::<_, ()>(client)
            })
            .await
            .ok()?;
        Some(Arc::clone(client))
    }

    /// The client for the calling OS thread.
    pub async fn client_for_current_thread(&self) -> Option<Arc<KnowledgeClient>> {
        let key = format!("{:?}", std::thread::current().id());
        self.client_for(&key).await
    }

    /// Install (or with `None`, forget) the client for `context_key`.
    pub async fn set_client(&self, context_key: &str, client: Option<Arc<KnowledgeClient>>) {
        let mut clients = self.clients.lock().await;
        match client {
            Some(c) => {
                clients.insert(context_key.to_string(), Arc::new(OnceCell::new_with(Some(c))));
            }
            None => {
                clients.remove(context_key);
            }
        }
    }

    /// Number of execution contexts holding a client.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("config", &self.config)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
fn default_builder() -> TransportBuilder {
    Arc::new(|config: &KnowledgeConfig| {
        let transport = crate::http::HttpTransport::new(
            config.base_url.as_str(),
            config.api_key.clone(),
            config.timeout(),
        )?;
        Ok(Arc::new(transport) as Arc<dyn GraphTransport>)
    })
}

#[cfg(not(feature = "http"))]
fn default_builder() -> TransportBuilder {
    Arc::new(|_: &KnowledgeConfig| {
        Err(TransportError::NotConfigured(
            "built without the `http` transport".into(),
        ))
    })
}
