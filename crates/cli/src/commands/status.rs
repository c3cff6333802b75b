//! `ctxforge status` — Show configuration and knowledge-service health.

use ctxforge_config::AppConfig;
use std::path::Path;

use super::{CommandResult, connect, load_config};

pub async fn run(config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let client = connect(&config).await?;
    let knowledge = &config.knowledge;
    let relevance = &config.relevance;

    println!("ctxforge status");
    println!("===============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!(
        "  Namespace:    {}",
        client.namespace().map(|ns| ns.as_str()).unwrap_or("(none, shared groups only)")
    );
    println!("  Service:      {}", knowledge.base_url);
    println!("  Enabled:      {}", if knowledge.enabled { "yes" } else { "no" });
    println!("  API key:      {}", if knowledge.api_key.is_some() { "set" } else { "not set" });
    println!("  Timeout:      {}s", knowledge.timeout_secs);
    println!(
        "  Thresholds:   first={:.2} standard={:.2} refinement={:.2} autobuild={:.2}",
        relevance.first_of_type_threshold,
        relevance.standard_threshold,
        relevance.refinement_threshold,
        relevance.autobuild_threshold
    );

    let connection = if !client.enabled() {
        "disabled"
    } else if client.healthy() {
        "connected"
    } else {
        "unavailable"
    };
    println!("\n  Knowledge graph: {connection}");

    Ok(())
}
