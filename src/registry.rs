//! Task Registry - the persisted list of tasks and their status machine
//!
//! Tasks enter through intake, move only through validated transitions,
//! and are never deleted: reaching `qa_verified` archives the record
//! (history included) into cold storage, the only way out of the active
//! set. An explicit restore brings an archived task back to `approved`.

use crate::error::{CoordError, CoordResult};
use crate::models::state_machine;
use crate::models::{Task, TaskStatus, TransitionRecord};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted active registry document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Derived counts by status, refreshed on every write
    #[serde(default)]
    pub status_counts: BTreeMap<String, usize>,
    pub last_updated: DateTime<Utc>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            status_counts: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl RegistryFile {
    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn find_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Tasks still in the active data set (archival and the review side
    /// branches are out)
    pub fn active_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| !state_machine::is_inactive_state(t.status))
            .collect()
    }

    pub fn recompute_counts(&mut self) {
        self.status_counts.clear();
        for task in &self.tasks {
            *self
                .status_counts
                .entry(task.status.as_str().to_string())
                .or_insert(0) += 1;
        }
    }
}

/// Cold storage for archived tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFile {
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub last_updated: DateTime<Utc>,
}

impl Default for ArchiveFile {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Validate and apply one status transition in place: history entry,
/// timestamp, and milestone progress. Pure document mutation; callers
/// hold the store guard and handle persistence.
pub fn apply_transition(
    task: &mut Task,
    to: TaskStatus,
    message: Option<String>,
) -> CoordResult<()> {
    let from = task.status;
    state_machine::transition_state(from, to)
        .map_err(|_| CoordError::InvalidTransition { from, to })?;

    let record = TransitionRecord::new(from, to, message);
    task.last_transition = record.timestamp;
    task.history.push(record);
    task.status = to;
    if let Some(percent) = state_machine::milestone_progress(to) {
        task.progress_percent = percent;
    }
    Ok(())
}

pub struct TaskRegistry {
    store: Store,
}

impl TaskRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn load(&self) -> CoordResult<RegistryFile> {
        self.store.read_document(&self.store.registry_path())
    }

    pub fn save(&self, registry: &mut RegistryFile) -> CoordResult<()> {
        registry.recompute_counts();
        registry.last_updated = Utc::now();
        self.store
            .write_document(&self.store.registry_path(), registry)
    }

    pub fn load_archive(&self) -> CoordResult<ArchiveFile> {
        self.store.read_document(&self.store.archive_path())
    }

    fn save_archive(&self, archive: &mut ArchiveFile) -> CoordResult<()> {
        archive.last_updated = Utc::now();
        self.store
            .write_document(&self.store.archive_path(), archive)
    }

    /// Intake entry point: register a new task. Duplicate ids are a store
    /// error since identity is owned by the intake process.
    pub fn create(&self, task: Task) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.load()?;
        if registry.find(&task.id).is_some() {
            return Err(CoordError::Store(format!(
                "task {} already registered",
                task.id
            )));
        }
        registry.tasks.push(task.clone());
        self.save(&mut registry)?;
        log::info!("[TaskRegistry] Registered task {}", task.id);
        Ok(task)
    }

    pub fn get(&self, task_id: &str) -> CoordResult<Task> {
        let registry = self.load()?;
        registry
            .find(task_id)
            .cloned()
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))
    }

    /// Perform a validated status transition and persist it
    pub fn transition(
        &self,
        task_id: &str,
        to: TaskStatus,
        message: Option<String>,
    ) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.load()?;
        let task = registry
            .find_mut(task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))?;
        let from = task.status;
        apply_transition(task, to, message)?;
        let updated = task.clone();
        self.save(&mut registry)?;
        log::info!("[TaskRegistry] Task {}: {} -> {}", task_id, from, to);
        Ok(updated)
    }

    /// Move a qa_verified task to cold storage. The record keeps its full
    /// history; the active registry drops it.
    pub fn archive(&self, task_id: &str) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut registry = self.load()?;
        let position = registry
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))?;

        let mut task = registry.tasks.remove(position);
        if let Err(e) = apply_transition(&mut task, TaskStatus::Archived, None) {
            // Put the record back before reporting the invalid transition
            registry.tasks.insert(position, task);
            return Err(e);
        }

        let mut archive = self.load_archive()?;
        archive.tasks.push(task.clone());
        self.save_archive(&mut archive)?;
        self.save(&mut registry)?;

        log::info!("[TaskRegistry] Archived task {}", task_id);
        Ok(task)
    }

    /// Restore an archived task back into the active registry as approved
    pub fn restore(&self, task_id: &str) -> CoordResult<Task> {
        let _guard = self.store.lock_exclusive()?;
        let mut archive = self.load_archive()?;
        let position = archive
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| CoordError::TaskNotFound(task_id.to_string()))?;

        let mut task = archive.tasks.remove(position);
        apply_transition(&mut task, TaskStatus::Approved, Some("restored".to_string()))?;

        let mut registry = self.load()?;
        registry.tasks.push(task.clone());
        self.save(&mut registry)?;
        self.save_archive(&mut archive)?;

        log::info!("[TaskRegistry] Restored task {} from archive", task_id);
        Ok(task)
    }
}
