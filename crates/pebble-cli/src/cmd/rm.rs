//! `pb rm` — remove an entry everywhere it lives.

use clap::Args;
use pebble_core::backend::{Registry, RemoveOutcome};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Entry id to remove.
    pub id: i64,
}

pub fn run_rm(args: &RmArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };

    for removal in registry.remove_entry(&entry)? {
        match removal.outcome {
            RemoveOutcome::ClosedInstead => {
                println!(
                    "NOTE: can't delete from {} - closed the issue instead",
                    removal.backend
                );
            }
            RemoveOutcome::Deleted if removal.backend == "local" => {
                println!("Deleted {:04}", args.id);
            }
            RemoveOutcome::Deleted => {}
        }
    }
    Ok(())
}
