// Lock subcommands: claim, release, check, list

use super::CommandContext;
use crate::error::CoordResult;
use crate::locks::LockStore;

fn lock_store(ctx: &CommandContext) -> LockStore {
    LockStore::new(ctx.store.clone(), ctx.config.lock_ttl_hours)
}

pub fn claim(
    ctx: &CommandContext,
    task_id: &str,
    agent_id: &str,
    files: &[String],
) -> CoordResult<()> {
    let claimed = lock_store(ctx).claim(task_id, files, agent_id)?;
    println!("Claimed {} file(s) for {}:", claimed.len(), task_id);
    for file in claimed {
        println!("  {}", file);
    }
    Ok(())
}

pub fn release(ctx: &CommandContext, task_id: &str) -> CoordResult<()> {
    let released = lock_store(ctx).release(task_id)?;
    if released.is_empty() {
        println!("No locks held by {}", task_id);
    } else {
        println!("Released {} file(s) for {}:", released.len(), task_id);
        for file in released {
            println!("  {}", file);
        }
    }
    Ok(())
}

pub fn check(ctx: &CommandContext, files: &[String]) -> CoordResult<()> {
    let report = lock_store(ctx).check(files)?;
    for entry in report {
        match entry.lock {
            Some(lock) => println!(
                "{}: locked by {} via {} since {}",
                entry.file, lock.task_id, lock.agent_id, lock.acquired_at
            ),
            None => println!("{}: unlocked", entry.file),
        }
    }
    Ok(())
}

pub fn list(ctx: &CommandContext) -> CoordResult<()> {
    let store = lock_store(ctx);
    let locks = store.list()?;
    if locks.is_empty() {
        println!("No locks held");
        return Ok(());
    }
    println!("{} lock(s):", locks.len());
    for (file, lock) in &locks {
        let stale = if store.is_stale(lock) { " (stale)" } else { "" };
        println!(
            "  {}: {} via {} since {}{}",
            file, lock.task_id, lock.agent_id, lock.acquired_at, stale
        );
    }
    Ok(())
}
