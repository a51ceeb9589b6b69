//! `pb burn` — chart open points over time and project the finish.

use chrono::Utc;
use clap::Args;
use pebble_core::backend::{Registry, TagFilter};
use pebble_core::burndown;

use crate::output;

#[derive(Args, Debug, Default)]
pub struct BurnArgs {
    /// Comma-separated tag filter; charts everything when omitted.
    pub tags: Option<String>,
}

pub fn run_burn(args: &BurnArgs, registry: &Registry) -> anyhow::Result<()> {
    let filter = args
        .tags
        .as_deref()
        .map_or_else(TagFilter::any, TagFilter::parse);
    let entries = registry.entries(&filter)?;

    match burndown::project(&entries, Utc::now().date_naive()) {
        Some(projection) => output::print_burndown(&projection),
        None => println!("Nothing to chart yet - add an entry first"),
    }
    Ok(())
}
