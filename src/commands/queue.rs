// Queue subcommands: get-next, complete, set-status, refresh, status

use super::CommandContext;
use crate::error::CoordResult;
use crate::models::TaskStatus;
use crate::orchestrator::RegenerationOrchestrator;
use crate::queue::QueueManager;
use crate::registry::TaskRegistry;

/// Run the regeneration hook for a transition recorded in the task's
/// history. Best-effort by design; the transition is already persisted.
fn regenerate(ctx: &CommandContext, task_id: &str, from: TaskStatus, to: TaskStatus) {
    let matcher = ctx.matcher();
    let orchestrator =
        RegenerationOrchestrator::new(ctx.store.clone(), ctx.config.clone(), &matcher);
    orchestrator.on_transition(task_id, from, to);
}

pub fn get_next(ctx: &CommandContext, agent_id: &str) -> CoordResult<()> {
    let queue = QueueManager::new(ctx.store.clone());
    match queue.get_next(agent_id)? {
        Some(task) => {
            println!("{}: {} (now in_progress, assigned to {})", task.id, task.title, agent_id);
            regenerate(ctx, &task.id, TaskStatus::Approved, TaskStatus::InProgress);
        }
        None => println!("No task available"),
    }
    Ok(())
}

pub fn complete(ctx: &CommandContext, agent_id: &str, task_id: &str) -> CoordResult<()> {
    let queue = QueueManager::new(ctx.store.clone());
    let task = queue.complete(agent_id, task_id)?;
    println!("{} completed by {} (now {})", task.id, agent_id, task.status);
    regenerate(ctx, &task.id, TaskStatus::InProgress, task.status);
    Ok(())
}

pub fn set_status(ctx: &CommandContext, task_id: &str, status: TaskStatus) -> CoordResult<()> {
    let queue = QueueManager::new(ctx.store.clone());
    let task = queue.set_status(task_id, status)?;
    println!("{} set to {}", task.id, task.status);

    if let Some(record) = task.history.last() {
        regenerate(ctx, &task.id, record.from, record.to);
    }
    Ok(())
}

pub fn refresh(ctx: &CommandContext) -> CoordResult<()> {
    let state = QueueManager::new(ctx.store.clone()).refresh()?;
    println!(
        "Queue refreshed: {} waiting, {} in progress, {} completed",
        state.waiting.len(),
        state.in_progress.len(),
        state.completed.len()
    );
    Ok(())
}

pub fn status(ctx: &CommandContext) -> CoordResult<()> {
    let registry = TaskRegistry::new(ctx.store.clone()).load()?;
    let queue = QueueManager::new(ctx.store.clone()).load()?;

    println!("Tasks by status:");
    for (status, count) in &registry.status_counts {
        println!("  {:<16} {}", status, count);
    }

    let state = &queue.state;
    println!("Queue:");
    println!("  waiting: {}", state.waiting.join(", "));
    for (task_id, entry) in &state.in_progress {
        println!(
            "  in progress: {} ({} since {})",
            task_id, entry.agent, entry.started_at
        );
    }
    println!("  completed: {}", state.completed.join(", "));
    Ok(())
}
