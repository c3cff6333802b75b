//! `ctxforge record` — File a knowledge episode.

use ctxforge_core::Category;
use std::path::Path;

use super::{CommandResult, connect, load_config};

/// Resolve a category by group name, listing the valid ones on failure.
fn parse_category(raw: &str) -> Result<Category, String> {
    Category::from_group_name(raw.trim()).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.group_name()).collect();
        format!("unknown category '{raw}' (expected one of: {})", known.join(", "))
    })
}

pub async fn run(config_path: Option<&Path>, name: &str, category: &str, body: &str) -> CommandResult {
    let category = parse_category(category)?;
    let config = load_config(config_path)?;
    let client = connect(&config).await?;

    match client.record(name, body, category).await? {
        Some(id) => println!("Recorded '{name}' in {} ({id})", category.group_name()),
        None => println!("Knowledge service unavailable; '{name}' was not recorded"),
    }
    Ok(())
}
