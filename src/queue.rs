//! Queue Manager - ordered backlog and atomic task hand-out
//!
//! Derives a waiting/in-progress/completed partition from the registry
//! and hands the next approved task to exactly one requesting agent.
//! Every mutation runs inside the store-wide exclusive lock, so the
//! pop-and-mark-in-progress is a single critical section shared with all
//! other registry mutations.

use crate::error::{CoordError, CoordResult};
use crate::models::{InProgressEntry, QueueState, Task, TaskStatus};
use crate::registry::{apply_transition, RegistryFile, TaskRegistry};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted queue document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueFile {
    #[serde(flatten)]
    pub state: QueueState,
    pub last_updated: DateTime<Utc>,
}

impl Default for QueueFile {
    fn default() -> Self {
        Self {
            state: QueueState::default(),
            last_updated: Utc::now(),
        }
    }
}

/// Sort tasks into backlog order: explicit roadmap sequence first, then
/// priority ordinal (lower is more urgent), then registry order. The sort
/// is stable, so ties keep their registry position.
pub fn backlog_order<'a>(tasks: &[&'a Task]) -> Vec<&'a Task> {
    let mut ordered: Vec<&Task> = tasks.to_vec();
    ordered.sort_by_key(|t| {
        (
            t.sequence.unwrap_or(u32::MAX),
            t.priority.unwrap_or(u32::MAX),
        )
    });
    ordered
}

fn waiting_status(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::PendingReview | TaskStatus::Approved)
}

fn completed_status(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::ReadyToDeploy | TaskStatus::Deployed | TaskStatus::QaVerified
    )
}

/// Rebuild the partition from the registry. Started-at timestamps of
/// already-known in-progress tasks survive the rebuild; tasks that
/// drifted in from outside the queue fall back to their last transition
/// time and recorded assignee.
pub fn rebuild_state(registry: &RegistryFile, previous: &QueueState) -> QueueState {
    let waiting_tasks: Vec<&Task> = registry
        .tasks
        .iter()
        .filter(|t| waiting_status(t.status))
        .collect();

    let mut state = QueueState {
        waiting: backlog_order(&waiting_tasks)
            .iter()
            .map(|t| t.id.clone())
            .collect(),
        in_progress: BTreeMap::new(),
        completed: registry
            .tasks
            .iter()
            .filter(|t| completed_status(t.status))
            .map(|t| t.id.clone())
            .collect(),
    };

    for task in registry.tasks.iter().filter(|t| t.status == TaskStatus::InProgress) {
        let entry = previous
            .in_progress
            .get(&task.id)
            .cloned()
            .unwrap_or_else(|| InProgressEntry {
                agent: task
                    .assigned_agent
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                started_at: task.last_transition,
            });
        state.in_progress.insert(task.id.clone(), entry);
    }

    state
}

pub struct QueueManager {
    store: Store,
    registry: TaskRegistry,
}

impl QueueManager {
    pub fn new(store: Store) -> Self {
        let registry = TaskRegistry::new(store.clone());
        Self { store, registry }
    }

    pub fn load(&self) -> CoordResult<QueueFile> {
        self.store.read_document(&self.store.queue_path())
    }

    fn save(&self, queue: &mut QueueFile) -> CoordResult<()> {
        queue.last_updated = Utc::now();
        self.store.write_document(&self.store.queue_path(), queue)
    }

    /// Rebuild the backlog/in-progress/completed partition from the
    /// registry, reconciling any drift from edits made outside the queue
    pub fn refresh(&self) -> CoordResult<QueueState> {
        let _guard = self.store.lock_exclusive()?;
        let registry = self.registry.load()?;
        let mut queue = self.load()?;
        queue.state = rebuild_state(&registry, &queue.state);
        self.save(&mut queue)?;
        log::info!(
            "[QueueManager] Refreshed: {} waiting, {} in progress, {} completed",
            queue.state.waiting.len(),
            queue.state.in_progress.len(),
            queue.state.completed.len()
        );
        Ok(queue.state)
    }

    /// Atomically hand the next approved task in backlog order to the
    /// agent, marking it in progress. An empty backlog is a valid
    /// nothing-to-do result, not an error.
    pub fn get_next(&self, agent_id: &str) -> CoordResult<Option<Task>> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.registry.load()?;
        let mut queue = self.load()?;
        queue.state = rebuild_state(&registry, &queue.state);

        let next_id = {
            let candidates: Vec<&Task> = registry
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Approved)
                .collect();
            backlog_order(&candidates).first().map(|t| t.id.clone())
        };

        let Some(task_id) = next_id else {
            log::info!("[QueueManager] No task available for {}", agent_id);
            return Ok(None);
        };

        let task = registry
            .find_mut(&task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.clone()))?;
        apply_transition(task, TaskStatus::InProgress, None)?;
        task.assigned_agent = Some(agent_id.to_string());
        let handed_out = task.clone();

        queue.state.waiting.retain(|id| id != &task_id);
        queue.state.in_progress.insert(
            task_id.clone(),
            InProgressEntry {
                agent: agent_id.to_string(),
                started_at: handed_out.last_transition,
            },
        );

        self.registry.save(&mut registry)?;
        self.save(&mut queue)?;

        log::info!("[QueueManager] Handed {} to {}", task_id, agent_id);
        Ok(Some(handed_out))
    }

    /// Report a task finished by its agent: transitions it to
    /// ready_to_deploy and moves it to the completed bucket
    pub fn complete(&self, agent_id: &str, task_id: &str) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.registry.load()?;
        let mut queue = self.load()?;

        let task = registry
            .find_mut(task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))?;

        if let Some(assignee) = &task.assigned_agent {
            if assignee != agent_id {
                log::warn!(
                    "[QueueManager] {} completed by {} but assigned to {}",
                    task_id,
                    agent_id,
                    assignee
                );
            }
        }

        apply_transition(task, TaskStatus::ReadyToDeploy, None)?;
        let completed = task.clone();

        queue.state.in_progress.remove(task_id);
        if !queue.state.completed.iter().any(|id| id == task_id) {
            queue.state.completed.push(task_id.to_string());
        }

        self.registry.save(&mut registry)?;
        self.save(&mut queue)?;

        log::info!("[QueueManager] {} completed by {}", task_id, agent_id);
        Ok(completed)
    }

    /// Manual status override. Still honors the state machine: invalid
    /// transitions are rejected, not silently applied.
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.registry.load()?;
        let mut queue = self.load()?;

        let task = registry
            .find_mut(task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))?;
        apply_transition(task, status, Some("manual override".to_string()))?;
        let updated = task.clone();

        queue.state = rebuild_state(&registry, &queue.state);

        self.registry.save(&mut registry)?;
        self.save(&mut queue)?;

        log::info!("[QueueManager] {} set to {}", task_id, status);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use tempfile::TempDir;

    fn setup() -> (TempDir, QueueManager, TaskRegistry) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        (
            temp_dir,
            QueueManager::new(store.clone()),
            TaskRegistry::new(store),
        )
    }

    fn add_approved(registry: &TaskRegistry, id: &str, priority: Option<u32>, sequence: Option<u32>) {
        let mut task = Task::new(id, format!("Task {}", id));
        task.priority = priority;
        task.sequence = sequence;
        registry.create(task).unwrap();
        registry
            .transition(id, TaskStatus::Approved, None)
            .unwrap();
    }

    #[test]
    fn test_backlog_order_sequence_beats_priority() {
        let mut a = Task::new("A", "a");
        a.priority = Some(1);
        let mut b = Task::new("B", "b");
        b.sequence = Some(1);
        b.priority = Some(9);
        let mut c = Task::new("C", "c");
        c.priority = Some(2);

        let ordered: Vec<&str> = backlog_order(&[&a, &b, &c])
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ordered, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_backlog_order_unprioritized_last_stable() {
        let a = Task::new("A", "a");
        let mut b = Task::new("B", "b");
        b.priority = Some(3);
        let c = Task::new("C", "c");

        let ordered: Vec<&str> = backlog_order(&[&a, &b, &c])
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ordered, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_get_next_hands_out_in_order() {
        let (_tmp, queue, registry) = setup();
        add_approved(&registry, "A", Some(2), None);
        add_approved(&registry, "B", Some(1), None);

        let first = queue.get_next("agent-1").unwrap().unwrap();
        assert_eq!(first.id, "B");
        assert_eq!(first.status, TaskStatus::InProgress);
        assert_eq!(first.assigned_agent.as_deref(), Some("agent-1"));
        assert_eq!(first.progress_percent, 10);

        let second = queue.get_next("agent-2").unwrap().unwrap();
        assert_eq!(second.id, "A");

        // Backlog drained
        assert!(queue.get_next("agent-3").unwrap().is_none());
    }

    #[test]
    fn test_get_next_skips_pending_review() {
        let (_tmp, queue, registry) = setup();
        registry.create(Task::new("A", "unreviewed")).unwrap();

        assert!(queue.get_next("agent-1").unwrap().is_none());
    }

    #[test]
    fn test_complete_moves_to_completed_bucket() {
        let (_tmp, queue, registry) = setup();
        add_approved(&registry, "A", None, None);
        queue.get_next("agent-1").unwrap().unwrap();

        let task = queue.complete("agent-1", "A").unwrap();
        assert_eq!(task.status, TaskStatus::ReadyToDeploy);
        assert_eq!(task.progress_percent, 60);

        let state = queue.load().unwrap().state;
        assert!(state.in_progress.is_empty());
        assert_eq!(state.completed, vec!["A".to_string()]);
    }

    #[test]
    fn test_complete_unknown_task_is_not_found() {
        let (_tmp, queue, _registry) = setup();
        assert!(matches!(
            queue.complete("agent-1", "missing"),
            Err(CoordError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_set_status_rejects_invalid_transition() {
        let (_tmp, queue, registry) = setup();
        add_approved(&registry, "A", None, None);

        let err = queue.set_status("A", TaskStatus::Deployed).unwrap_err();
        assert!(matches!(err, CoordError::InvalidTransition { .. }));

        // Valid manual override still works
        let task = queue.set_status("A", TaskStatus::Deferred).unwrap();
        assert_eq!(task.status, TaskStatus::Deferred);
    }

    #[test]
    fn test_refresh_reconciles_outside_edits() {
        let (_tmp, queue, registry) = setup();
        add_approved(&registry, "A", None, None);
        add_approved(&registry, "B", None, None);
        queue.refresh().unwrap();

        // A moves forward outside the queue manager
        registry
            .transition("A", TaskStatus::InProgress, None)
            .unwrap();

        let state = queue.refresh().unwrap();
        assert_eq!(state.waiting, vec!["B".to_string()]);
        assert!(state.in_progress.contains_key("A"));
        assert!(state.completed.is_empty());
    }

    #[test]
    fn test_partition_invariant_no_task_in_two_buckets() {
        let (_tmp, queue, registry) = setup();
        add_approved(&registry, "A", None, None);
        add_approved(&registry, "B", None, None);
        registry.create(Task::new("C", "pending")).unwrap();
        queue.get_next("agent-1").unwrap();

        let state = queue.refresh().unwrap();
        // Every active task in exactly one bucket
        assert_eq!(state.total(), 3);
        for id in ["A", "B", "C"] {
            let hits = state.waiting.iter().filter(|x| x.as_str() == id).count()
                + state.in_progress.contains_key(id) as usize
                + state.completed.iter().filter(|x| x.as_str() == id).count();
            assert_eq!(hits, 1, "task {} should be in exactly one bucket", id);
        }
    }

    #[test]
    fn test_concurrent_get_next_hands_out_distinct_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::for_project(temp_dir.path());
        let registry = TaskRegistry::new(store.clone());
        for id in ["A", "B"] {
            let mut task = Task::new(id, format!("Task {}", id));
            task.priority = Some(1);
            registry.create(task).unwrap();
            registry.transition(id, TaskStatus::Approved, None).unwrap();
        }

        let root = temp_dir.path().to_path_buf();
        let mut handles = Vec::new();
        for i in 0..2 {
            let root = root.clone();
            handles.push(std::thread::spawn(move || {
                let queue = QueueManager::new(Store::for_project(&root));
                queue
                    .get_next(&format!("agent-{}", i))
                    .unwrap()
                    .map(|t| t.id)
            }));
        }

        let mut received: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().unwrap().expect("two tasks for two agents"))
            .collect();
        received.sort();
        assert_eq!(received, vec!["A".to_string(), "B".to_string()]);
    }
}
