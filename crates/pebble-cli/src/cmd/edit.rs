//! `pb edit` — rewrite an entry's message in $EDITOR.

use clap::Args;
use pebble_core::backend::Registry;

use crate::editor;

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Entry id to edit.
    pub id: i64,
}

pub fn run_edit(args: &EditArgs, registry: &mut Registry) -> anyhow::Result<()> {
    let Some(mut entry) = registry.entry(args.id)? else {
        println!("{:04} doesn't exist", args.id);
        return Ok(());
    };

    let Some(msg) = editor::edit_text(Some(&entry.msg))? else {
        println!("Cancelled edit");
        return Ok(());
    };

    registry.update_entry(&mut entry, &msg)?;
    println!("Modified {:04}: {}", args.id, entry.summary());
    Ok(())
}
