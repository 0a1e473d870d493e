// Typed errors for the coordination core

use crate::models::TaskStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One conflicting file inside a failed claim, with its current holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConflictEntry {
    pub file: String,
    pub holder_task: String,
    pub holder_agent: String,
}

impl std::fmt::Display for LockConflictEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (held by {} via {})",
            self.file, self.holder_task, self.holder_agent
        )
    }
}

/// Error taxonomy for coordination operations.
///
/// An empty queue is not an error: `QueueManager::get_next` returns
/// `Ok(None)` when there is nothing to hand out.
#[derive(Debug, Error)]
pub enum CoordError {
    /// One or more requested files are already held by a different task.
    /// Carries every conflicting file and its holder.
    #[error("lock conflict on {} file(s)", .conflicts.len())]
    LockConflict { conflicts: Vec<LockConflictEntry> },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// The persisted store could not be read or written. Fatal for the
    /// calling operation; atomic replace-on-write keeps state intact.
    #[error("store unavailable: {0}")]
    Store(String),
}

pub type CoordResult<T> = Result<T, CoordError>;
