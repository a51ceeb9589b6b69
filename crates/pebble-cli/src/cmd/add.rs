//! `pb add` — create an entry from the command line.

use std::collections::BTreeSet;

use clap::Args;
use pebble_core::{backend::Registry, model::Entry};

use crate::editor;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Comma-separated tags for the new entry.
    pub tags: String,

    /// Entry message; the first line is the summary.
    pub msg: String,

    /// Effort estimate in points.
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub points: u32,

    /// Open $EDITOR to refine the message before saving.
    #[arg(short, long)]
    pub edit: bool,
}

pub fn run_add(args: &AddArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let mut msg = args.msg.clone();
    if args.edit {
        match editor::edit_text(Some(&msg))? {
            Some(edited) => msg = edited,
            None => {
                println!("Cancelled add");
                return Ok(());
            }
        }
    }

    let mut entry = Entry::new(msg, args.points, parse_tags(&args.tags));
    registry.add_entry(&mut entry)?;
    if let Some(id) = entry.id {
        println!("Added {id:04}: {}", entry.summary());
    }
    Ok(())
}

pub(crate) fn parse_tags(csv: &str) -> BTreeSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}
