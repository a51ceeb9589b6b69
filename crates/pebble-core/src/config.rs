//! Typed accessors over the project's key/value config table.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    backend::BackendKind,
    error::{Error, Result},
    model::datetime_from_us,
    store::Store,
};

/// Stable random id for this project; keys per-project secrets.
pub const PROJECT_ID: &str = "project.id";

/// Microsecond timestamp of the last sync pass.
pub const LAST_SYNC: &str = "last_sync";

/// Keys under this prefix flag an attached remote plugin.
pub const PLUGIN_PREFIX: &str = "plugin.";

/// The project id assigned on first open.
///
/// # Errors
///
/// Returns an error if config cannot be read or the id was never assigned.
pub fn project_id(store: &Store) -> Result<String> {
    store.config_get(PROJECT_ID)?.ok_or_else(|| {
        Error::Config("project id missing; the database was not initialized properly".into())
    })
}

/// Names of the remote plugins flagged active in config.
///
/// # Errors
///
/// Returns an error if config cannot be read.
pub fn active_plugins(store: &Store) -> Result<Vec<String>> {
    Ok(store
        .config_prefixed(PLUGIN_PREFIX)?
        .into_iter()
        .map(|(key, _)| key[PLUGIN_PREFIX.len()..].to_string())
        .collect())
}

/// Flag a remote plugin active. Only one remote may be attached at a time;
/// re-activating the same kind is fine.
///
/// # Errors
///
/// Returns an error if a different remote is already attached.
pub fn activate_plugin(store: &mut Store, kind: BackendKind) -> Result<()> {
    for name in active_plugins(store)? {
        if name != kind.name() {
            return Err(Error::Config(format!(
                "remote '{name}' is already attached; run `pb remote rm {name}` before adding '{kind}'"
            )));
        }
    }
    store.config_set(&plugin_key(kind), "on")
}

/// Drop a remote plugin's activation flag.
///
/// # Errors
///
/// Returns an error if config cannot be written.
pub fn deactivate_plugin(store: &mut Store, kind: BackendKind) -> Result<()> {
    store.config_delete(&plugin_key(kind))
}

/// Whether a remote plugin is flagged active.
///
/// # Errors
///
/// Returns an error if config cannot be read.
pub fn is_plugin_active(store: &Store, kind: BackendKind) -> Result<bool> {
    Ok(store.config_get(&plugin_key(kind))?.is_some())
}

fn plugin_key(kind: BackendKind) -> String {
    format!("{PLUGIN_PREFIX}{}", kind.name())
}

/// When the last sync pass ran, if ever. An unparseable value is treated as
/// never; the next pass overwrites it.
///
/// # Errors
///
/// Returns an error if config cannot be read.
pub fn last_sync(store: &Store) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = store.config_get(LAST_SYNC)? else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(us) => Ok(Some(datetime_from_us(us))),
        Err(_) => {
            warn!(value = %raw, "ignoring unparseable last_sync config value");
            Ok(None)
        }
    }
}

/// Record when a sync pass ran.
///
/// # Errors
///
/// Returns an error if config cannot be written.
pub fn set_last_sync(store: &mut Store, when: DateTime<Utc>) -> Result<()> {
    store.config_set(LAST_SYNC, &when.timestamp_micros().to_string())
}
