pub mod context;
pub mod record;
pub mod status;

use ctxforge_config::AppConfig;
use ctxforge_knowledge::{ClientFactory, KnowledgeClient};
use std::path::Path;
use std::sync::Arc;

/// Context key for the single client a CLI invocation uses.
const CLI_CONTEXT: &str = "cli";

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load config from `path`, or the default location, with environment
/// overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into());
    };
    AppConfig::load_with(path, |key| std::env::var(key).ok())
        .map_err(|e| format!("Failed to load config: {e}").into())
}

/// The knowledge client for this invocation, tenant resolved from the
/// working directory. A disabled service still yields a client so callers
/// get empty results instead of a special case.
pub async fn connect(config: &AppConfig) -> Result<Arc<KnowledgeClient>, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let factory = ClientFactory::from_config(config.knowledge.clone(), &cwd)?;
    let client = match factory.client_for(CLI_CONTEXT).await {
        Some(client) => client,
        None => Arc::new(KnowledgeClient::disabled(factory.namespace().cloned())),
    };
    Ok(client)
}
