//! `pb tag`, `pb untag`, `pb tags` — manage the labels on entries.

use clap::Args;
use pebble_core::backend::{Change, Registry};

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Tag to attach.
    pub tag: String,

    /// Entry id.
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct UntagArgs {
    /// Tag to remove.
    pub tag: String,

    /// Entry id.
    pub id: i64,
}

pub fn run_tag(args: &TagArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };
    match registry.tag_entry(&entry, &args.tag)? {
        Change::Applied => println!("Tagged {:04} with {}", args.id, args.tag),
        Change::Noop => println!("{:04} already tagged with {}", args.id, args.tag),
    }
    Ok(())
}

pub fn run_untag(args: &UntagArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };
    match registry.untag_entry(&entry, &args.tag)? {
        Change::Applied => println!("Untagged {:04} with {}", args.id, args.tag),
        Change::Noop => println!("{:04} wasn't tagged with {}", args.id, args.tag),
    }
    Ok(())
}

pub fn run_tags(registry: &Registry) -> anyhow::Result<()> {
    for (tag, count) in registry.local().tag_counts()? {
        println!("{tag} - {count}");
    }
    Ok(())
}
