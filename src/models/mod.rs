// Data models persisted in the coordination store

pub mod state_machine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a task.
///
/// The transition graph lives in [`state_machine`]; this enum is just the
/// vocabulary. `rejected` and `deferred` are side branches reachable during
/// review; `archived` is cold storage reached only from `qa_verified`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    PendingReview,
    Approved,
    InProgress,
    ReadyToDeploy,
    Deployed,
    QaVerified,
    Archived,
    Rejected,
    Deferred,
}

impl TaskStatus {
    /// Returns all statuses, forward path first, side branches last
    pub fn all() -> &'static [TaskStatus] {
        &[
            TaskStatus::PendingReview,
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::ReadyToDeploy,
            TaskStatus::Deployed,
            TaskStatus::QaVerified,
            TaskStatus::Archived,
            TaskStatus::Rejected,
            TaskStatus::Deferred,
        ]
    }

    /// Returns the string representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::PendingReview => "pending_review",
            TaskStatus::Approved => "approved",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::ReadyToDeploy => "ready_to_deploy",
            TaskStatus::Deployed => "deployed",
            TaskStatus::QaVerified => "qa_verified",
            TaskStatus::Archived => "archived",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Deferred => "deferred",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending_review" => Ok(TaskStatus::PendingReview),
            "approved" => Ok(TaskStatus::Approved),
            "in_progress" => Ok(TaskStatus::InProgress),
            "ready_to_deploy" => Ok(TaskStatus::ReadyToDeploy),
            "deployed" => Ok(TaskStatus::Deployed),
            "qa_verified" => Ok(TaskStatus::QaVerified),
            "archived" => Ok(TaskStatus::Archived),
            "rejected" => Ok(TaskStatus::Rejected),
            "deferred" => Ok(TaskStatus::Deferred),
            _ => Err(format!(
                "Unknown status: '{}'. Expected one of: pending_review, approved, in_progress, ready_to_deploy, deployed, qa_verified, archived, rejected, deferred",
                s
            )),
        }
    }
}

/// One entry in a task's transition history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    /// Unique record ID
    pub id: String,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// Optional operator-supplied note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransitionRecord {
    pub fn new(from: TaskStatus, to: TaskStatus, message: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            from,
            to,
            message,
        }
    }
}

/// A unit of work picked up by exactly one agent at a time.
///
/// Created by an external intake process, mutated only through registry
/// transitions, never deleted: archival moves the whole record (history
/// included) to the archive document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque identity, e.g. `INIT-042`
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    /// Priority ordinal; lower is more urgent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Explicit roadmap position; takes precedence over priority when ordering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Files this task is expected to touch. May be empty; the overlap
    /// analyzer falls back to the keyword matcher when it is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default)]
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub last_transition: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<TransitionRecord>,
}

impl Task {
    /// Create a new task awaiting review
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::PendingReview,
            priority: None,
            sequence: None,
            assigned_agent: None,
            tags: Vec::new(),
            files: Vec::new(),
            progress_percent: 0,
            created_at: now,
            last_transition: now,
            history: Vec::new(),
        }
    }
}

/// An exclusive claim on one file path. Keyed by path in the lock table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub task_id: String,
    pub agent_id: String,
    pub acquired_at: DateTime<Utc>,
}

/// Coarse conflict bucket derived from an overlap ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Tier boundaries are exclusive at the lower bound, inclusive at the
    /// upper: low for ratio <= 0.2, medium for 0.2 < ratio <= 0.5, high above.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.5 {
            RiskTier::High
        } else if ratio > 0.2 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Similarity between one unordered pair of tasks, based on their file sets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapRecord {
    pub task_a: String,
    pub task_b: String,
    /// Jaccard ratio in [0, 1]: |shared| / |union|, 0 for an empty union
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_files: Vec<String>,
    pub risk: RiskTier,
}

impl OverlapRecord {
    /// True if this record covers the given unordered pair
    pub fn covers(&self, a: &str, b: &str) -> bool {
        (self.task_a == a && self.task_b == b) || (self.task_a == b && self.task_b == a)
    }
}

/// Pair of approved tasks whose overlap exceeds the hard-warning boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskWarning {
    pub task_a: String,
    pub task_b: String,
    pub ratio: f64,
}

/// Planner verdict derived from comparing the largest safe group against
/// the number of agents already working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum Recommendation {
    AddAgents(usize),
    Wait,
    ReduceBy(usize),
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::AddAgents(n) => write!(f, "add {} agent(s)", n),
            Recommendation::Wait => write!(f, "wait"),
            Recommendation::ReduceBy(n) => write!(f, "reduce by {}", n),
        }
    }
}

/// Safe-group partition for one overlap threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPlan {
    pub threshold: f64,
    /// Consecutive safe groups covering every eligible task
    pub groups: Vec<Vec<String>>,
    /// Membership of the largest group
    pub max_group: Vec<String>,
    pub recommendation: Recommendation,
}

/// Output of one planner run across all requested thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelizationPlan {
    pub generated_at: DateTime<Utc>,
    pub in_progress_count: usize,
    pub plans: Vec<ThresholdPlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<HighRiskWarning>,
}

/// One running assignment inside the queue state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InProgressEntry {
    pub agent: String,
    pub started_at: DateTime<Utc>,
}

/// Derived queue partition: every active task sits in exactly one bucket.
///
/// `rejected`, `deferred`, and `archived` tasks are outside the partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    #[serde(default)]
    pub waiting: Vec<String>,
    #[serde(default)]
    pub in_progress: BTreeMap<String, InProgressEntry>,
    #[serde(default)]
    pub completed: Vec<String>,
}

impl QueueState {
    /// Total number of tasks tracked across all three buckets
    pub fn total(&self) -> usize {
        self.waiting.len() + self.in_progress.len() + self.completed.len()
    }

    /// True if the id appears in any bucket
    pub fn contains(&self, task_id: &str) -> bool {
        self.waiting.iter().any(|id| id == task_id)
            || self.in_progress.contains_key(task_id)
            || self.completed.iter().any(|id| id == task_id)
    }
}
