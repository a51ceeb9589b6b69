//! Reconciliation between the local store and the attached remote.
//!
//! The pass is deliberately simple. Fetch everything from both sides, push
//! local entries that have no remote link yet, pull remote entries whose
//! link no local entry carries. There is no field-level merge; an entry is
//! either known on both sides or copied across once. The remote link written
//! back after a push is what keeps later passes from copying twice.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    backend::{Backend, Registry, TagFilter},
    config,
    error::Result,
};

/// Unforced passes closer together than this are skipped.
pub const MIN_SYNC_INTERVAL_SECS: i64 = 60 * 60;

/// What a sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Whether a pass actually ran (false when skipped or rate limited).
    pub ran: bool,
    /// Local entries pushed to the remote.
    pub pushed: usize,
    /// Remote entries pulled into the local store.
    pub pulled: usize,
    /// Entries that failed to copy in either direction.
    pub failed: usize,
}

/// Run one reconcile pass against the registry's remote, if any.
///
/// The pass timestamp is recorded up front, so even a pass that dies on the
/// remote fetch counts against the rate limit; `force` bypasses the limit.
/// A failed remote fetch aborts the pass before any writes, because pushing
/// against an incomplete remote listing would duplicate entries.
///
/// # Errors
///
/// Returns an error if the remote fetch or local bookkeeping fails.
/// Per-entry copy failures are logged and counted instead.
pub fn run(registry: &mut Registry, now: DateTime<Utc>, force: bool) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let (local, remote) = registry.split_mut();
    let Some(remote) = remote else {
        debug!("no remote backend attached; nothing to sync");
        return Ok(report);
    };

    if !force {
        if let Some(last) = config::last_sync(local)? {
            if now.signed_duration_since(last).num_seconds() < MIN_SYNC_INTERVAL_SECS {
                debug!(%last, "sync ran recently; skipping");
                return Ok(report);
            }
        }
    }
    config::set_last_sync(local, now)?;

    let remote_entries = remote.fetch_entries(&TagFilter::any(), None)?;
    let local_entries = local.fetch_entries(&TagFilter::any(), None)?;
    report.ran = true;

    let known: HashSet<&str> = local_entries
        .iter()
        .filter_map(|entry| entry.remote_id.as_deref())
        .collect();

    // Push: local entries that never made it to the remote.
    for entry in &local_entries {
        if entry.remote_id.is_some() || entry.msg.trim().is_empty() {
            continue;
        }
        let mut outbound = entry.clone();
        match remote.add_entry(&mut outbound) {
            Ok(()) => match (entry.id, outbound.remote_id.as_deref()) {
                (Some(id), Some(remote_id)) => match local.set_remote_id(id, remote_id) {
                    Ok(()) => report.pushed += 1,
                    Err(error) => {
                        warn!(entry = id, %error, "pushed entry but failed to record its link");
                        report.failed += 1;
                    }
                },
                _ => {
                    warn!(entry = ?entry.id, "remote accepted the entry but returned no id");
                    report.failed += 1;
                }
            },
            Err(error) => {
                warn!(entry = ?entry.id, %error, "failed to push entry");
                report.failed += 1;
            }
        }
    }

    // Pull: remote entries no local entry links to.
    for entry in &remote_entries {
        let Some(remote_id) = entry.remote_id.as_deref() else {
            continue;
        };
        if known.contains(remote_id) {
            continue;
        }
        let mut inbound = entry.clone();
        match local.add_entry(&mut inbound) {
            Ok(()) => report.pulled += 1,
            Err(error) => {
                warn!(remote_id, %error, "failed to pull entry");
                report.failed += 1;
            }
        }
    }

    if report.pushed > 0 || report.pulled > 0 || report.failed > 0 {
        info!(
            pushed = report.pushed,
            pulled = report.pulled,
            failed = report.failed,
            "sync pass finished"
        );
    }
    Ok(report)
}
