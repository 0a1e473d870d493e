// Task status state machine with validation

use super::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// Validates if a task can transition from one status to another.
///
/// The graph is one-directional: pending_review -> approved -> in_progress
/// -> ready_to_deploy -> deployed -> qa_verified -> archived, with rejected
/// and deferred reachable from the two review states. The only backward
/// edge is the explicit restore from archived to approved.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    match (from, to) {
        // Review states
        (TaskStatus::PendingReview, TaskStatus::Approved) => true,
        (TaskStatus::PendingReview, TaskStatus::Rejected) => true,
        (TaskStatus::PendingReview, TaskStatus::Deferred) => true,
        (TaskStatus::Approved, TaskStatus::InProgress) => true,
        (TaskStatus::Approved, TaskStatus::Rejected) => true,
        (TaskStatus::Approved, TaskStatus::Deferred) => true,

        // Forward path
        (TaskStatus::InProgress, TaskStatus::ReadyToDeploy) => true,
        (TaskStatus::ReadyToDeploy, TaskStatus::Deployed) => true,
        (TaskStatus::Deployed, TaskStatus::QaVerified) => true,
        (TaskStatus::QaVerified, TaskStatus::Archived) => true,

        // Restore from cold storage
        (TaskStatus::Archived, TaskStatus::Approved) => true,

        // All other transitions are invalid
        _ => false,
    }
}

/// Validates and performs a state transition
pub fn transition_state(
    current: TaskStatus,
    target: TaskStatus,
) -> Result<TaskStatus, StateTransitionError> {
    if !can_transition(current, target) {
        return Err(StateTransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

/// Check if a status keeps the task out of the active data set
pub fn is_inactive_state(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Archived | TaskStatus::Rejected | TaskStatus::Deferred
    )
}

/// Check if a status indicates active work
pub fn is_active_state(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::InProgress)
}

/// Milestone progress percentage auto-applied when entering a status.
/// Statuses without a milestone leave the percentage untouched.
pub fn milestone_progress(status: TaskStatus) -> Option<u8> {
    match status {
        TaskStatus::InProgress => Some(10),
        TaskStatus::ReadyToDeploy => Some(60),
        TaskStatus::Deployed => Some(80),
        TaskStatus::QaVerified => Some(100),
        _ => None,
    }
}

/// True when entering this status must archive the task out of the active
/// registry. qa_verified is the only archival trigger.
pub fn triggers_archival(status: TaskStatus) -> bool {
    status == TaskStatus::QaVerified
}

/// Get all valid next states from current state
pub fn valid_next_states(current: TaskStatus) -> Vec<TaskStatus> {
    TaskStatus::all()
        .iter()
        .copied()
        .filter(|&state| can_transition(current, state))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        assert!(can_transition(
            TaskStatus::PendingReview,
            TaskStatus::Approved
        ));
        assert!(can_transition(TaskStatus::Approved, TaskStatus::InProgress));
        assert!(can_transition(
            TaskStatus::InProgress,
            TaskStatus::ReadyToDeploy
        ));
        assert!(can_transition(
            TaskStatus::ReadyToDeploy,
            TaskStatus::Deployed
        ));
        assert!(can_transition(TaskStatus::Deployed, TaskStatus::QaVerified));
        assert!(can_transition(TaskStatus::QaVerified, TaskStatus::Archived));
    }

    #[test]
    fn test_side_branches() {
        assert!(can_transition(
            TaskStatus::PendingReview,
            TaskStatus::Rejected
        ));
        assert!(can_transition(
            TaskStatus::PendingReview,
            TaskStatus::Deferred
        ));
        assert!(can_transition(TaskStatus::Approved, TaskStatus::Rejected));
        assert!(can_transition(TaskStatus::Approved, TaskStatus::Deferred));
        // Side branches are not reachable later in the pipeline
        assert!(!can_transition(TaskStatus::InProgress, TaskStatus::Rejected));
        assert!(!can_transition(TaskStatus::Deployed, TaskStatus::Deferred));
    }

    #[test]
    fn test_no_backward_edges() {
        assert!(!can_transition(
            TaskStatus::InProgress,
            TaskStatus::Approved
        ));
        assert!(!can_transition(
            TaskStatus::Deployed,
            TaskStatus::ReadyToDeploy
        ));
        assert!(!can_transition(
            TaskStatus::Approved,
            TaskStatus::PendingReview
        ));
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!can_transition(
            TaskStatus::PendingReview,
            TaskStatus::InProgress
        ));
        assert!(!can_transition(TaskStatus::Approved, TaskStatus::Deployed));
        assert!(!can_transition(
            TaskStatus::InProgress,
            TaskStatus::QaVerified
        ));
    }

    #[test]
    fn test_same_state_rejected() {
        assert!(!can_transition(TaskStatus::Approved, TaskStatus::Approved));
        assert!(!can_transition(
            TaskStatus::InProgress,
            TaskStatus::InProgress
        ));
    }

    #[test]
    fn test_restore_from_archive() {
        assert!(can_transition(TaskStatus::Archived, TaskStatus::Approved));
        assert!(!can_transition(
            TaskStatus::Archived,
            TaskStatus::InProgress
        ));
        assert!(!can_transition(
            TaskStatus::Archived,
            TaskStatus::PendingReview
        ));
    }

    #[test]
    fn test_transition_state_error_carries_statuses() {
        let result = transition_state(TaskStatus::PendingReview, TaskStatus::Deployed);
        match result {
            Err(StateTransitionError::InvalidTransition { from, to }) => {
                assert_eq!(from, TaskStatus::PendingReview);
                assert_eq!(to, TaskStatus::Deployed);
            }
            Ok(_) => panic!("expected invalid transition"),
        }
    }

    #[test]
    fn test_inactive_states() {
        assert!(is_inactive_state(TaskStatus::Archived));
        assert!(is_inactive_state(TaskStatus::Rejected));
        assert!(is_inactive_state(TaskStatus::Deferred));
        assert!(!is_inactive_state(TaskStatus::QaVerified));
        assert!(!is_inactive_state(TaskStatus::PendingReview));
    }

    #[test]
    fn test_milestone_progress() {
        assert_eq!(milestone_progress(TaskStatus::InProgress), Some(10));
        assert_eq!(milestone_progress(TaskStatus::ReadyToDeploy), Some(60));
        assert_eq!(milestone_progress(TaskStatus::Deployed), Some(80));
        assert_eq!(milestone_progress(TaskStatus::QaVerified), Some(100));
        assert_eq!(milestone_progress(TaskStatus::Approved), None);
        assert_eq!(milestone_progress(TaskStatus::Rejected), None);
    }

    #[test]
    fn test_triggers_archival() {
        assert!(triggers_archival(TaskStatus::QaVerified));
        assert!(!triggers_archival(TaskStatus::Deployed));
        assert!(!triggers_archival(TaskStatus::Archived));
    }

    #[test]
    fn test_valid_next_states() {
        let states = valid_next_states(TaskStatus::PendingReview);
        assert!(states.contains(&TaskStatus::Approved));
        assert!(states.contains(&TaskStatus::Rejected));
        assert!(states.contains(&TaskStatus::Deferred));
        assert_eq!(states.len(), 3);

        let states = valid_next_states(TaskStatus::QaVerified);
        assert_eq!(states, vec![TaskStatus::Archived]);

        assert!(valid_next_states(TaskStatus::Rejected).is_empty());
        assert!(valid_next_states(TaskStatus::Deferred).is_empty());
    }
}
