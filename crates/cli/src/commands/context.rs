//! `ctxforge context` — Retrieve job-specific context for a task.

use clap::Args;
use ctxforge_core::{TaskPhase, WorkItem};
use ctxforge_retrieval::{JobContextRetriever, RelevanceConfig};
use std::path::Path;

use super::{CommandResult, connect, load_config};

#[derive(Debug, Args)]
pub struct ContextArgs {
    /// What the task is about
    #[arg(short, long)]
    pub description: String,

    /// Task identifier
    #[arg(long)]
    pub id: Option<String>,

    /// 1 (trivial) to 10 (very complex)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub complexity: Option<u8>,

    /// load, plan, implement, test or review
    #[arg(long, default_value = "load")]
    pub phase: String,

    /// implementation, review, planning, refinement or documentation
    #[arg(long)]
    pub task_type: Option<String>,

    /// Technology tag (e.g. `rust`, `python`)
    #[arg(long)]
    pub tech_stack: Option<String>,

    /// Refinement attempt number; 0 for a first attempt
    #[arg(long)]
    pub refinement: Option<u32>,

    /// Run as a player/coach workflow task
    #[arg(long)]
    pub autobuild: bool,

    /// player or coach
    #[arg(long)]
    pub actor: Option<String>,

    /// Workflow turn number
    #[arg(long)]
    pub turn: Option<u32>,

    /// Print the full bundle as JSON
    #[arg(long)]
    pub json: bool,
}

impl ContextArgs {
    fn work_item(&self) -> WorkItem {
        let turn = self.turn.unwrap_or(0);
        WorkItem {
            id: self.id.clone(),
            description: Some(self.description.clone()),
            tech_stack: self.tech_stack.clone(),
            task_type: self.task_type.clone(),
            complexity: self.complexity,
            refinement_attempt: self.refinement,
            current_actor: self.actor.clone(),
            turn_number: self.turn,
            is_autobuild: self.autobuild,
            has_previous_turns: self.autobuild && turn > 1,
            ..Default::default()
        }
    }
}

pub async fn run(config_path: Option<&Path>, args: ContextArgs) -> CommandResult {
    let config = load_config(config_path)?;
    let phase: TaskPhase = args.phase.parse()?;

    let client = connect(&config).await?;
    let relevance = RelevanceConfig::from_settings(&config.relevance)?;
    let retriever = JobContextRetriever::new(client, relevance, &config.retrieval)?;

    let context = retriever.retrieve(&args.work_item(), phase).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else {
        print!("{}", context.to_prompt());
    }

    let min_rate = config.retrieval.min_relevance_rate;
    if !context.is_empty() && !context.quality_metrics.is_quality_acceptable(min_rate) {
        tracing::warn!(
            relevance_rate = context.quality_metrics.relevance_rate(),
            min_rate,
            "Retrieved context is below the relevance target"
        );
    }

    Ok(())
}
