//! Command implementations behind the `pb` subcommands.

pub mod add;
pub mod burn;
pub mod edit;
pub mod feature;
pub mod plan;
pub mod remote;
pub mod rm;
pub mod show;
pub mod state;
pub mod sync;
pub mod tag;
