// Plan subcommand: calculate

use super::CommandContext;
use crate::error::CoordResult;
use crate::planner::ParallelizationPlanner;

pub fn calculate(ctx: &CommandContext, thresholds: &[f64]) -> CoordResult<()> {
    let thresholds = if thresholds.is_empty() {
        ctx.config.thresholds.clone()
    } else {
        thresholds.to_vec()
    };

    let planner = ParallelizationPlanner::new(ctx.store.clone(), ctx.config.max_agents);
    let plan = planner.calculate(&thresholds)?;

    println!("{} task(s) in progress", plan.in_progress_count);
    for threshold_plan in &plan.plans {
        println!(
            "Threshold {:.2}: largest safe group has {} task(s) [{}] -> {}",
            threshold_plan.threshold,
            threshold_plan.max_group.len(),
            threshold_plan.max_group.join(", "),
            threshold_plan.recommendation
        );
        for (i, group) in threshold_plan.groups.iter().enumerate() {
            println!("  group {}: {}", i + 1, group.join(", "));
        }
    }

    for warning in &plan.warnings {
        println!(
            "WARNING: {} and {} overlap {:.2} (high risk)",
            warning.task_a, warning.task_b, warning.ratio
        );
    }
    Ok(())
}
