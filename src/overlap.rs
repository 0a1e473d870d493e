//! Overlap Analyzer - pairwise file-set similarity between active tasks
//!
//! For every unordered pair of active tasks, computes the Jaccard ratio
//! of their file sets and buckets it into a risk tier. The matrix is
//! recomputed wholesale on each run (O(n^2) in active tasks) and replaces
//! the previous one; nothing is maintained incrementally.

use crate::error::CoordResult;
use crate::matcher::{file_set, FileMatcher};
use crate::models::{OverlapRecord, ParallelizationPlan, RiskTier, Task};
use crate::registry::TaskRegistry;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The persisted analysis document: overlap matrix plus the latest plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFile {
    #[serde(default)]
    pub records: Vec<OverlapRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ParallelizationPlan>,
    pub generated_at: DateTime<Utc>,
}

impl Default for AnalysisFile {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            plan: None,
            generated_at: Utc::now(),
        }
    }
}

/// Jaccard similarity of two file sets, with the shared files.
/// An empty union has similarity 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> (f64, Vec<String>) {
    let shared: Vec<String> = a.intersection(b).cloned().collect();
    let union = a.union(b).count();
    if union == 0 {
        return (0.0, shared);
    }
    (shared.len() as f64 / union as f64, shared)
}

/// Compute the full pairwise matrix for the given tasks
pub fn analyze_tasks(tasks: &[&Task], matcher: &dyn FileMatcher) -> Vec<OverlapRecord> {
    let file_sets: Vec<BTreeSet<String>> =
        tasks.iter().map(|t| file_set(t, matcher)).collect();

    let mut records = Vec::new();
    for i in 0..tasks.len() {
        for j in (i + 1)..tasks.len() {
            let (ratio, shared_files) = jaccard(&file_sets[i], &file_sets[j]);
            records.push(OverlapRecord {
                task_a: tasks[i].id.clone(),
                task_b: tasks[j].id.clone(),
                ratio,
                shared_files,
                risk: RiskTier::from_ratio(ratio),
            });
        }
    }
    records
}

pub struct OverlapAnalyzer<'a> {
    store: Store,
    matcher: &'a dyn FileMatcher,
}

impl<'a> OverlapAnalyzer<'a> {
    pub fn new(store: Store, matcher: &'a dyn FileMatcher) -> Self {
        Self { store, matcher }
    }

    /// Recompute the matrix over the registry's active tasks and persist
    /// it, keeping the previously stored plan untouched. Derived state:
    /// a single atomic replace, no store guard needed.
    pub fn run(&self) -> CoordResult<Vec<OverlapRecord>> {
        let registry = TaskRegistry::new(self.store.clone()).load()?;
        let active = registry.active_tasks();
        let records = analyze_tasks(&active, self.matcher);

        let mut analysis: AnalysisFile =
            self.store.read_document(&self.store.analysis_path())?;
        analysis.records = records.clone();
        analysis.generated_at = Utc::now();
        self.store
            .write_document(&self.store.analysis_path(), &analysis)?;

        log::info!(
            "[OverlapAnalyzer] Analyzed {} task(s), {} pair(s)",
            active.len(),
            records.len()
        );
        Ok(records)
    }
}
