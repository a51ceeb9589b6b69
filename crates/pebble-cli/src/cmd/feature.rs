//! `pb feature` — promote tags to feature headings in the listing.

use clap::Subcommand;
use pebble_core::backend::Registry;

#[derive(Subcommand, Debug)]
pub enum FeatureCommand {
    /// Mark a tag as a feature.
    Add {
        /// Tag to promote.
        tag: String,
    },
    /// Demote a feature back to a plain tag.
    Rm {
        /// Tag to demote.
        tag: String,
    },
}

pub fn run_feature(command: &FeatureCommand, registry: &mut Registry) -> anyhow::Result<()> {
    match command {
        FeatureCommand::Add { tag } => {
            registry.add_feature(tag)?;
            println!("Added feature {tag}");
        }
        FeatureCommand::Rm { tag } => {
            registry.remove_feature(tag)?;
            println!("Removed feature {tag}");
        }
    }
    Ok(())
}
