//! pebble-core library: entry model, storage backends, sync, and burndown.

pub mod backend;
pub mod burndown;
pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod model;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
