//! `pb sync` — force a reconciliation pass against the remote.

use chrono::Utc;
use pebble_core::{backend::Registry, sync};

pub fn run_sync(registry: &mut Registry) -> anyhow::Result<()> {
    if !registry.has_remote() {
        println!("No remote backend configured - try `pb remote add github`");
        return Ok(());
    }

    let report = sync::run(registry, Utc::now(), true)?;
    let name = registry.remote_name().unwrap_or("remote");
    println!(
        "Synced with {name}: {} pushed, {} pulled",
        report.pushed, report.pulled
    );
    if report.failed > 0 {
        println!("NOTE: {} entries failed to sync; see the log", report.failed);
    }
    Ok(())
}
