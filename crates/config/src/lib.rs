//! Configuration loading, validation, and management for ctxforge.
//!
//! Loads configuration from `~/.ctxforge/config.toml` with environment
//! variable overrides. Validates all settings at load time. The engine
//! crates never read files or the environment themselves; they receive
//! the plain values resolved here.

use ctxforge_core::{ConfigError, Namespace};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `knowledge.base_url`.
pub const ENV_KNOWLEDGE_URL: &str = "CTXFORGE_KNOWLEDGE_URL";
/// Environment variable overriding `knowledge.api_key`.
pub const ENV_KNOWLEDGE_API_KEY: &str = "CTXFORGE_KNOWLEDGE_API_KEY";
/// Environment variable overriding `knowledge.project_id`.
pub const ENV_PROJECT_ID: &str = "CTXFORGE_PROJECT_ID";
/// Environment variable overriding `knowledge.enabled`.
pub const ENV_KNOWLEDGE_ENABLED: &str = "CTXFORGE_KNOWLEDGE_ENABLED";

/// The root configuration structure.
///
/// Maps directly to `~/.ctxforge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge-graph service connection
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Relevance thresholds
    #[serde(default)]
    pub relevance: RelevanceSettings,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Treat a missing `api_key` as "service unavailable".
    #[serde(default)]
    pub require_api_key: bool,

    /// Per-call timeout at the gateway boundary.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive failures before the circuit breaker trips.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Explicit tenant namespace. Falls back to the working-directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_failures() -> u32 {
    3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            api_key: None,
            require_api_key: false,
            timeout_secs: default_timeout_secs(),
            max_failures: default_max_failures(),
            project_id: None,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for KnowledgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("require_api_key", &self.require_api_key)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_failures", &self.max_failures)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl KnowledgeConfig {
    /// Resolve the tenant namespace for a client running in `cwd`.
    ///
    /// An explicit `project_id` wins and must already be valid. Otherwise
    /// the directory name is normalized; `None` means no usable name, so
    /// the client can only address shared groups.
    pub fn resolve_namespace(&self, cwd: &Path) -> Result<Option<Namespace>, ConfigError> {
        if let Some(id) = &self.project_id {
            return Namespace::new(id).map(Some);
        }
        Ok(cwd
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(Namespace::normalize))
    }

    /// Whether credentials required by this configuration are present.
    pub fn has_credentials(&self) -> bool {
        !self.require_api_key || self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// The four relevance thresholds, as plain values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceSettings {
    #[serde(default = "default_first_of_type")]
    pub first_of_type_threshold: f64,

    #[serde(default = "default_standard")]
    pub standard_threshold: f64,

    #[serde(default = "default_refinement")]
    pub refinement_threshold: f64,

    #[serde(default = "default_autobuild")]
    pub autobuild_threshold: f64,
}

fn default_first_of_type() -> f64 {
    0.5
}
fn default_standard() -> f64 {
    0.6
}
fn default_refinement() -> f64 {
    0.55
}
fn default_autobuild() -> f64 {
    0.5
}

impl Default for RelevanceSettings {
    fn default() -> Self {
        Self {
            first_of_type_threshold: default_first_of_type(),
            standard_threshold: default_standard(),
            refinement_threshold: default_refinement(),
            autobuild_threshold: default_autobuild(),
        }
    }
}

impl RelevanceSettings {
    /// Each threshold with its name, for validation and display.
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("first_of_type", self.first_of_type_threshold),
            ("standard", self.standard_threshold),
            ("refinement", self.refinement_threshold),
            ("autobuild", self.autobuild_threshold),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result cap for every gateway search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Minimum relevance rate for a retrieval to count as acceptable.
    #[serde(default = "default_min_relevance_rate")]
    pub min_relevance_rate: f64,
}

fn default_search_limit() -> usize {
    10
}
fn default_min_relevance_rate() -> f64 {
    0.7
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            min_relevance_rate: default_min_relevance_rate(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ctxforge/config.toml).
    ///
    /// Environment overrides are applied on top of the file:
    /// - `CTXFORGE_KNOWLEDGE_URL`
    /// - `CTXFORGE_KNOWLEDGE_API_KEY`
    /// - `CTXFORGE_PROJECT_ID`
    /// - `CTXFORGE_KNOWLEDGE_ENABLED`
    pub fn load() -> Result<Self, LoadError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with(&config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file path, without overrides.
    pub fn load_from(path: &Path) -> Result<Self, LoadError> {
        let config = Self::read_from(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, apply overrides through `lookup`, then validate the
    /// merged result.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, LoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read_from(path)?;
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` without validating. A missing file yields defaults.
    fn read_from(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| LoadError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| LoadError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_KNOWLEDGE_URL) {
            self.knowledge.base_url = url;
        }
        if let Some(key) = lookup(ENV_KNOWLEDGE_API_KEY) {
            self.knowledge.api_key = Some(key);
        }
        if let Some(project) = lookup(ENV_PROJECT_ID) {
            self.knowledge.project_id = Some(project);
        }
        if let Some(enabled) = lookup(ENV_KNOWLEDGE_ENABLED) {
            match enabled.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.knowledge.enabled = true,
                "0" | "false" | "no" | "off" => self.knowledge.enabled = false,
                other => tracing::warn!(
                    value = other,
                    "Ignoring unrecognized {ENV_KNOWLEDGE_ENABLED} value"
                ),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ctxforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = &self.knowledge.project_id {
            let ns = Namespace::new(id)?;
            if ns.as_str() != id {
                return Err(ConfigError::InvalidProjectId {
                    value: id.clone(),
                    reason: "project_id must be lowercase".into(),
                });
            }
        }

        for (name, value) in self.relevance.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if self.knowledge.timeout_secs == 0 {
            return Err(ConfigError::Invalid("knowledge.timeout_secs must be > 0".into()));
        }

        if self.knowledge.max_failures == 0 {
            return Err(ConfigError::Invalid("knowledge.max_failures must be >= 1".into()));
        }

        if self.retrieval.search_limit == 0 {
            return Err(ConfigError::Invalid("retrieval.search_limit must be > 0".into()));
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_relevance_rate) {
            return Err(ConfigError::Invalid(
                "retrieval.min_relevance_rate must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    Invalid(#[from] ConfigError),
}
