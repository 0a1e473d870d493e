//! Parallelization Planner - greedy safe-group construction
//!
//! Consumes the overlap matrix and proposes which approved tasks can run
//! concurrently. The construction is a greedy independent-set heuristic,
//! not an exact solver: it seeds with the first eligible task in backlog
//! order, adds each later task only if its overlap against every selected
//! task stays strictly below the threshold, then repeats on the remainder
//! until every eligible task sits in some safe group.

use crate::error::CoordResult;
use crate::models::{
    HighRiskWarning, OverlapRecord, ParallelizationPlan, Recommendation, Task, TaskStatus,
    ThresholdPlan,
};
use crate::overlap::AnalysisFile;
use crate::queue::backlog_order;
use crate::registry::TaskRegistry;
use crate::storage::Store;
use chrono::Utc;
use std::collections::HashMap;

/// Overlap ratio above which a pair of approved tasks is flagged as a
/// hard warning regardless of grouping
pub const HARD_WARNING_RATIO: f64 = 0.5;

/// Symmetric lookup over the pairwise overlap records. Unknown pairs
/// read as 0 (disjoint).
pub struct OverlapMatrix {
    ratios: HashMap<(String, String), f64>,
}

impl OverlapMatrix {
    pub fn from_records(records: &[OverlapRecord]) -> Self {
        let mut ratios = HashMap::new();
        for record in records {
            ratios.insert(
                Self::key(&record.task_a, &record.task_b),
                record.ratio,
            );
        }
        Self { ratios }
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn ratio(&self, a: &str, b: &str) -> f64 {
        self.ratios
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Partition the eligible ids into consecutive safe groups. Within a
/// group every pairwise overlap is strictly below the threshold.
/// Tie-breaking is by input order.
pub fn safe_groups(eligible: &[String], matrix: &OverlapMatrix, threshold: f64) -> Vec<Vec<String>> {
    let mut remaining: Vec<&String> = eligible.iter().collect();
    let mut groups = Vec::new();

    while !remaining.is_empty() {
        let mut group: Vec<String> = Vec::new();
        let mut leftover: Vec<&String> = Vec::new();

        for id in remaining {
            let safe = group
                .iter()
                .all(|member| matrix.ratio(member, id) < threshold);
            if safe {
                group.push((*id).clone());
            } else {
                leftover.push(id);
            }
        }

        groups.push(group);
        remaining = leftover;
    }

    groups
}

fn recommend(safe_size: usize, in_progress: usize, max_agents: usize) -> Recommendation {
    let capped = safe_size.min(max_agents);
    if capped > in_progress {
        Recommendation::AddAgents(capped - in_progress)
    } else if capped == in_progress {
        Recommendation::Wait
    } else {
        Recommendation::ReduceBy(in_progress - capped)
    }
}

pub struct ParallelizationPlanner {
    store: Store,
    max_agents: usize,
}

impl ParallelizationPlanner {
    pub fn new(store: Store, max_agents: usize) -> Self {
        Self { store, max_agents }
    }

    /// Build a plan for the given thresholds from the stored overlap
    /// matrix and the registry, and persist it into the analysis
    /// document. Derived state: atomic replace, no store guard needed.
    pub fn calculate(&self, thresholds: &[f64]) -> CoordResult<ParallelizationPlan> {
        let registry = TaskRegistry::new(self.store.clone()).load()?;
        let mut analysis: AnalysisFile =
            self.store.read_document(&self.store.analysis_path())?;
        let matrix = OverlapMatrix::from_records(&analysis.records);

        let approved: Vec<&Task> = registry
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Approved)
            .collect();
        let eligible: Vec<String> = backlog_order(&approved)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let in_progress_count = registry
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();

        let warnings = self.high_risk_warnings(&eligible, &analysis.records);
        for warning in &warnings {
            log::warn!(
                "[Planner] High-risk pair {} / {} (overlap {:.2})",
                warning.task_a,
                warning.task_b,
                warning.ratio
            );
        }

        let mut plans = Vec::new();
        for &threshold in thresholds {
            let groups = safe_groups(&eligible, &matrix, threshold);
            let max_group = groups
                .iter()
                .max_by_key(|g| g.len())
                .cloned()
                .unwrap_or_default();
            let recommendation =
                recommend(max_group.len(), in_progress_count, self.max_agents);
            plans.push(ThresholdPlan {
                threshold,
                groups,
                max_group,
                recommendation,
            });
        }

        let plan = ParallelizationPlan {
            generated_at: Utc::now(),
            in_progress_count,
            plans,
            warnings,
        };

        analysis.plan = Some(plan.clone());
        self.store
            .write_document(&self.store.analysis_path(), &analysis)?;

        log::info!(
            "[Planner] Planned {} eligible task(s) across {} threshold(s)",
            eligible.len(),
            thresholds.len()
        );
        Ok(plan)
    }

    /// Approved pairs whose overlap exceeds the hard boundary, whatever
    /// group they land in
    fn high_risk_warnings(
        &self,
        eligible: &[String],
        records: &[OverlapRecord],
    ) -> Vec<HighRiskWarning> {
        records
            .iter()
            .filter(|r| r.ratio > HARD_WARNING_RATIO)
            .filter(|r| {
                eligible.iter().any(|id| id == &r.task_a)
                    && eligible.iter().any(|id| id == &r.task_b)
            })
            .map(|r| HighRiskWarning {
                task_a: r.task_a.clone(),
                task_b: r.task_b.clone(),
                ratio: r.ratio,
            })
            .collect()
    }
}
