//! Regeneration Orchestrator - re-planning after status changes
//!
//! Watches status transitions and decides whether the overlap matrix and
//! parallelization plan must be rebuilt. Only transitions in a static
//! significance table trigger regeneration; anything else is a no-op.
//! Regeneration is best-effort: downstream failures are logged and never
//! roll back the transition that triggered them.

use crate::config::CoordConfig;
use crate::matcher::FileMatcher;
use crate::models::{state_machine, TaskStatus};
use crate::overlap::OverlapAnalyzer;
use crate::planner::ParallelizationPlanner;
use crate::queue::QueueManager;
use crate::registry::TaskRegistry;
use crate::storage::Store;

/// Static table of transitions that require re-planning: entering or
/// leaving in_progress, approval, and every forward step from approved
/// through qa_verified.
pub fn is_significant(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::PendingReview, TaskStatus::Approved)
            | (TaskStatus::Approved, TaskStatus::InProgress)
            | (TaskStatus::InProgress, TaskStatus::ReadyToDeploy)
            | (TaskStatus::ReadyToDeploy, TaskStatus::Deployed)
            | (TaskStatus::Deployed, TaskStatus::QaVerified)
    )
}

pub struct RegenerationOrchestrator<'a> {
    store: Store,
    config: CoordConfig,
    matcher: &'a dyn FileMatcher,
}

impl<'a> RegenerationOrchestrator<'a> {
    pub fn new(store: Store, config: CoordConfig, matcher: &'a dyn FileMatcher) -> Self {
        Self {
            store,
            config,
            matcher,
        }
    }

    /// React to a completed status transition. The transition itself has
    /// already been persisted; nothing here can undo it.
    pub fn on_transition(&self, task_id: &str, from: TaskStatus, to: TaskStatus) {
        if !is_significant(from, to) {
            log::debug!(
                "[Orchestrator] {} -> {} on {} is not significant, skipping",
                from,
                to,
                task_id
            );
            return;
        }

        log::info!(
            "[Orchestrator] Significant transition {} -> {} on {}, regenerating",
            from,
            to,
            task_id
        );

        if state_machine::triggers_archival(to) {
            let registry = TaskRegistry::new(self.store.clone());
            match registry.archive(task_id) {
                Ok(_) => {
                    // Drop the archived id from the queue partition
                    if let Err(e) = QueueManager::new(self.store.clone()).refresh() {
                        log::warn!("[Orchestrator] Queue refresh after archival failed: {}", e);
                    }
                }
                Err(e) => {
                    log::warn!("[Orchestrator] Archival of {} failed: {}", task_id, e);
                }
            }
        }

        let analyzer = OverlapAnalyzer::new(self.store.clone(), self.matcher);
        if let Err(e) = analyzer.run() {
            log::warn!("[Orchestrator] Overlap analysis failed: {}", e);
            return;
        }

        let planner = ParallelizationPlanner::new(self.store.clone(), self.config.max_agents);
        if let Err(e) = planner.calculate(&self.config.thresholds) {
            log::warn!("[Orchestrator] Plan calculation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoordError;
    use crate::matcher::NoopFileMatcher;
    use crate::models::Task;
    use crate::overlap::AnalysisFile;
    use tempfile::TempDir;

    #[test]
    fn test_significance_table() {
        assert!(is_significant(
            TaskStatus::PendingReview,
            TaskStatus::Approved
        ));
        assert!(is_significant(TaskStatus::Approved, TaskStatus::InProgress));
        assert!(is_significant(
            TaskStatus::InProgress,
            TaskStatus::ReadyToDeploy
        ));
        assert!(is_significant(
            TaskStatus::ReadyToDeploy,
            TaskStatus::Deployed
        ));
        assert!(is_significant(TaskStatus::Deployed, TaskStatus::QaVerified));

        assert!(!is_significant(
            TaskStatus::PendingReview,
            TaskStatus::Rejected
        ));
        assert!(!is_significant(
            TaskStatus::PendingReview,
            TaskStatus::Deferred
        ));
        assert!(!is_significant(TaskStatus::QaVerified, TaskStatus::Archived));
        assert!(!is_significant(TaskStatus::Archived, TaskStatus::Approved));
    }

    fn setup() -> (TempDir, Store, TaskRegistry) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        let registry = TaskRegistry::new(store.clone());
        (temp_dir, store, registry)
    }

    #[test]
    fn test_significant_transition_regenerates_analysis() {
        let (_tmp, store, registry) = setup();
        let mut task = Task::new("A", "Task A");
        task.files = vec!["a.ts".to_string()];
        registry.create(task).unwrap();
        let mut other = Task::new("B", "Task B");
        other.files = vec!["a.ts".to_string()];
        registry.create(other).unwrap();
        registry.transition("B", TaskStatus::Approved, None).unwrap();

        let orchestrator =
            RegenerationOrchestrator::new(store.clone(), CoordConfig::default(), &NoopFileMatcher);
        registry.transition("A", TaskStatus::Approved, None).unwrap();
        orchestrator.on_transition("A", TaskStatus::PendingReview, TaskStatus::Approved);

        let analysis: AnalysisFile = store.read_document(&store.analysis_path()).unwrap();
        assert_eq!(analysis.records.len(), 1);
        assert!(analysis.plan.is_some());
    }

    #[test]
    fn test_non_significant_transition_is_noop() {
        let (_tmp, store, registry) = setup();
        registry.create(Task::new("A", "Task A")).unwrap();
        registry
            .transition("A", TaskStatus::Rejected, None)
            .unwrap();

        let orchestrator =
            RegenerationOrchestrator::new(store.clone(), CoordConfig::default(), &NoopFileMatcher);
        orchestrator.on_transition("A", TaskStatus::PendingReview, TaskStatus::Rejected);

        // No analysis document was produced
        assert!(!store.analysis_path().exists());
    }

    #[test]
    fn test_qa_verified_triggers_archival() {
        let (_tmp, store, registry) = setup();
        registry.create(Task::new("A", "Task A")).unwrap();
        for status in [
            TaskStatus::Approved,
            TaskStatus::InProgress,
            TaskStatus::ReadyToDeploy,
            TaskStatus::Deployed,
            TaskStatus::QaVerified,
        ] {
            registry.transition("A", status, None).unwrap();
        }

        let orchestrator =
            RegenerationOrchestrator::new(store.clone(), CoordConfig::default(), &NoopFileMatcher);
        orchestrator.on_transition("A", TaskStatus::Deployed, TaskStatus::QaVerified);

        // Out of the active registry, history preserved in the archive
        assert!(matches!(
            registry.get("A"),
            Err(CoordError::TaskNotFound(_))
        ));
        let archive = registry.load_archive().unwrap();
        assert_eq!(archive.tasks.len(), 1);
        assert_eq!(archive.tasks[0].status, TaskStatus::Archived);
        assert!(!archive.tasks[0].history.is_empty());
    }

    #[test]
    fn test_downstream_failure_does_not_roll_back() {
        let (_tmp, store, registry) = setup();
        registry.create(Task::new("A", "Task A")).unwrap();
        registry.transition("A", TaskStatus::Approved, None).unwrap();

        // Corrupt the analysis document so regeneration fails to load it
        crate::storage::ensure_dir(store.root()).unwrap();
        std::fs::write(store.analysis_path(), "{broken").unwrap();

        let orchestrator =
            RegenerationOrchestrator::new(store.clone(), CoordConfig::default(), &NoopFileMatcher);
        orchestrator.on_transition("A", TaskStatus::PendingReview, TaskStatus::Approved);

        // The transition stands even though regeneration failed
        let task = registry.get("A").unwrap();
        assert_eq!(task.status, TaskStatus::Approved);
    }
}
