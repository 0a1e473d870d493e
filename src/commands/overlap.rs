// Overlap subcommand: analyze

use super::CommandContext;
use crate::error::CoordResult;
use crate::overlap::OverlapAnalyzer;

pub fn analyze(ctx: &CommandContext) -> CoordResult<()> {
    let matcher = ctx.matcher();
    let records = OverlapAnalyzer::new(ctx.store.clone(), &matcher).run()?;

    if records.is_empty() {
        println!("No task pairs to analyze");
        return Ok(());
    }

    println!("{} pair(s) analyzed:", records.len());
    for record in &records {
        println!(
            "  {} / {}: {:.2} ({}, {} shared file(s))",
            record.task_a,
            record.task_b,
            record.ratio,
            record.risk,
            record.shared_files.len()
        );
    }
    Ok(())
}
