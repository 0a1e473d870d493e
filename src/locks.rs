//! Lock Store - exclusive file claims for agent tasks
//!
//! Maps file paths to the task holding them. Claims are all-or-nothing:
//! a single conflicting file fails the whole call and reports every
//! conflict. Stale locks (older than the configured TTL) are purged
//! lazily at the start of the next claim or check, before conflicts are
//! evaluated. Mutations serialize across processes through the
//! store-wide exclusive lock.

use crate::error::{CoordError, CoordResult, LockConflictEntry};
use crate::models::Lock;
use crate::storage::Store;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted lock table document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTable {
    #[serde(default)]
    pub locks: BTreeMap<String, Lock>,
    pub last_updated: DateTime<Utc>,
}

impl Default for LockTable {
    fn default() -> Self {
        Self {
            locks: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

/// A file reported by `check`, with its holder if any
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockCheckEntry {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
}

pub struct LockStore {
    store: Store,
    ttl: Duration,
}

impl LockStore {
    pub fn new(store: Store, ttl_hours: i64) -> Self {
        Self {
            store,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Claim every file for the task, atomically. Files held by a
    /// different task fail the whole call with a conflict report naming
    /// each one; files already held by the same task are re-claimed
    /// idempotently without touching their acquisition timestamp.
    /// Returns the full list of claimed files.
    pub fn claim(
        &self,
        task_id: &str,
        files: &[String],
        agent_id: &str,
    ) -> CoordResult<Vec<String>> {
        let _guard = self.store.lock_exclusive()?;
        let mut table: LockTable = self.store.read_document(&self.store.locks_path())?;
        let purged = self.purge_stale(&mut table);

        let conflicts: Vec<LockConflictEntry> = files
            .iter()
            .filter_map(|file| {
                table
                    .locks
                    .get(file)
                    .filter(|lock| lock.task_id != task_id)
                    .map(|lock| LockConflictEntry {
                        file: file.clone(),
                        holder_task: lock.task_id.clone(),
                        holder_agent: lock.agent_id.clone(),
                    })
            })
            .collect();

        if !conflicts.is_empty() {
            // Persist the GC pass even though the claim failed
            if purged > 0 {
                table.last_updated = Utc::now();
                self.store.write_document(&self.store.locks_path(), &table)?;
            }
            return Err(CoordError::LockConflict { conflicts });
        }

        let now = Utc::now();
        for file in files {
            table.locks.entry(file.clone()).or_insert_with(|| Lock {
                task_id: task_id.to_string(),
                agent_id: agent_id.to_string(),
                acquired_at: now,
            });
        }
        table.last_updated = now;
        self.store.write_document(&self.store.locks_path(), &table)?;

        log::info!(
            "[LockStore] Task {} claimed {} file(s) via {}",
            task_id,
            files.len(),
            agent_id
        );
        Ok(files.to_vec())
    }

    /// Remove every lock owned by the task; returns the released files.
    /// A task holding no locks is a no-op, not an error.
    pub fn release(&self, task_id: &str) -> CoordResult<Vec<String>> {
        let _guard = self.store.lock_exclusive()?;
        let mut table: LockTable = self.store.read_document(&self.store.locks_path())?;

        let released: Vec<String> = table
            .locks
            .iter()
            .filter(|(_, lock)| lock.task_id == task_id)
            .map(|(file, _)| file.clone())
            .collect();

        if !released.is_empty() {
            table.locks.retain(|_, lock| lock.task_id != task_id);
            table.last_updated = Utc::now();
            self.store.write_document(&self.store.locks_path(), &table)?;
            log::info!(
                "[LockStore] Task {} released {} file(s)",
                task_id,
                released.len()
            );
        }
        Ok(released)
    }

    /// Report which of the given files are currently locked and by whom.
    /// Purges stale locks first (the only side effect), so the report
    /// never names a holder past its TTL.
    pub fn check(&self, files: &[String]) -> CoordResult<Vec<LockCheckEntry>> {
        let _guard = self.store.lock_exclusive()?;
        let mut table: LockTable = self.store.read_document(&self.store.locks_path())?;
        let purged = self.purge_stale(&mut table);
        if purged > 0 {
            table.last_updated = Utc::now();
            self.store.write_document(&self.store.locks_path(), &table)?;
        }

        Ok(files
            .iter()
            .map(|file| LockCheckEntry {
                file: file.clone(),
                lock: table.locks.get(file).cloned(),
            })
            .collect())
    }

    /// All current locks, stale ones included (GC runs on claim/check only)
    pub fn list(&self) -> CoordResult<BTreeMap<String, Lock>> {
        let table: LockTable = self.store.read_document(&self.store.locks_path())?;
        Ok(table.locks)
    }

    /// True if the lock has outlived the TTL
    pub fn is_stale(&self, lock: &Lock) -> bool {
        Utc::now() - lock.acquired_at > self.ttl
    }

    fn purge_stale(&self, table: &mut LockTable) -> usize {
        let before = table.locks.len();
        let cutoff = Utc::now() - self.ttl;
        table.locks.retain(|file, lock| {
            let keep = lock.acquired_at > cutoff;
            if !keep {
                log::info!(
                    "[LockStore] Purging stale lock on {} (held by {} since {})",
                    file,
                    lock.task_id,
                    lock.acquired_at
                );
            }
            keep
        });
        before - table.locks.len()
    }
}
