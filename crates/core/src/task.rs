//! Units of work and their analyzed characteristics.
//!
//! A [`WorkItem`] is the loosely-specified description a caller hands in;
//! every field is optional. [`TaskCharacteristics`] is the fully-populated
//! view the retrieval pipeline works from, rebuilt for every call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Building features, fixing bugs, creating code.
    #[default]
    Implementation,
    /// Analyzing architecture, assessing quality.
    Review,
    /// Designing an implementation approach.
    Planning,
    /// Improving or fixing a previous attempt.
    Refinement,
    /// Writing or updating documentation.
    Documentation,
}

impl TaskType {
    /// Resolve a task-type alias, case-insensitively.
    pub fn from_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "implementation" | "implement" => Some(Self::Implementation),
            "review" => Some(Self::Review),
            "planning" | "plan" => Some(Self::Planning),
            "refinement" | "refine" => Some(Self::Refinement),
            "documentation" | "docs" | "doc" => Some(Self::Documentation),
            _ => None,
        }
    }

    /// Classify an optional raw type, defaulting to implementation.
    pub fn classify(raw: Option<&str>) -> Self {
        raw.and_then(Self::from_alias).unwrap_or_default()
    }
}

/// Execution phase within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Load,
    Plan,
    Implement,
    Test,
    Review,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Test => "test",
            Self::Review => "review",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "plan" => Ok(Self::Plan),
            "implement" => Ok(Self::Implement),
            "test" => Ok(Self::Test),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown phase '{other}'")),
        }
    }
}

/// The agent currently acting in a player/coach workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Implements.
    Player,
    /// Validates the player's work.
    Coach,
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "player" => Ok(Self::Player),
            "coach" => Ok(Self::Coach),
            other => Err(format!("unknown actor '{other}'")),
        }
    }
}

/// A raw unit of work as supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    /// 1-10.
    #[serde(default)]
    pub complexity: Option<u8>,
    #[serde(default)]
    pub feature_id: Option<String>,
    /// 0 for a first attempt.
    #[serde(default)]
    pub refinement_attempt: Option<u32>,
    #[serde(default)]
    pub last_failure_type: Option<String>,

    // Agent-workflow context
    #[serde(default)]
    pub current_actor: Option<String>,
    #[serde(default)]
    pub turn_number: Option<u32>,
    #[serde(default)]
    pub is_autobuild: bool,
    #[serde(default)]
    pub has_previous_turns: bool,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }
}

/// Analyzed characteristics of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCharacteristics {
    // Basic info
    pub task_id: String,
    pub description: String,
    pub tech_stack: String,

    // Classification
    pub task_type: TaskType,
    pub current_phase: TaskPhase,
    pub complexity: u8,

    // Novelty
    pub is_first_of_type: bool,
    pub similar_task_count: usize,

    // Context
    pub feature_id: Option<String>,
    pub is_refinement: bool,
    pub refinement_attempt: u32,
    pub previous_failure_type: Option<String>,

    // Historical performance
    pub avg_turns_for_type: f64,
    pub success_rate_for_type: f64,

    // Agent workflow
    /// `None` when the caller named an actor this engine does not know.
    pub current_actor: Option<Actor>,
    pub turn_number: u32,
    pub is_autobuild: bool,
    pub has_previous_turns: bool,
}

impl TaskCharacteristics {
    /// Whether the historical statistics are usable numbers.
    pub fn is_well_formed(&self) -> bool {
        self.avg_turns_for_type.is_finite()
            && self.avg_turns_for_type >= 0.0
            && self.success_rate_for_type.is_finite()
            && (0.0..=1.0).contains(&self.success_rate_for_type)
    }
}

impl Default for TaskCharacteristics {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            description: String::new(),
            tech_stack: "python".into(),
            task_type: TaskType::Implementation,
            current_phase: TaskPhase::Load,
            complexity: 5,
            is_first_of_type: false,
            similar_task_count: 0,
            feature_id: None,
            is_refinement: false,
            refinement_attempt: 0,
            previous_failure_type: None,
            avg_turns_for_type: 3.0,
            success_rate_for_type: 0.8,
            current_actor: Some(Actor::Player),
            turn_number: 0,
            is_autobuild: false,
            has_previous_turns: false,
        }
    }
}
