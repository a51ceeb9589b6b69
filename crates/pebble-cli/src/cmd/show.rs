//! `pb show` — the default listing, or a single entry in full.

use chrono::Utc;
use clap::Args;
use pebble_core::backend::{Registry, TagFilter};

use crate::output;

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Comma-separated tag filter, or a bare entry id for the full view.
    pub tags: Option<String>,

    /// Include finished entries.
    #[arg(short, long)]
    pub all: bool,
}

pub fn run_show(args: &ShowArgs, registry: &Registry) -> anyhow::Result<()> {
    // A lone number is an id, not a tag.
    if let Some(id) = args
        .tags
        .as_deref()
        .and_then(|value| value.parse::<i64>().ok())
    {
        return show_one(registry, id);
    }

    let filter = args
        .tags
        .as_deref()
        .map_or_else(TagFilter::any, TagFilter::parse);
    let entries = registry.entries(&filter)?;
    let features = registry.features()?;
    output::print_entries(&entries, &features, args.all, Utc::now());
    Ok(())
}

fn show_one(registry: &Registry, id: i64) -> anyhow::Result<()> {
    match registry.entry(id)? {
        Some(entry) => output::print_entry(&entry),
        None => println!("{id:04} doesn't exist"),
    }
    Ok(())
}
