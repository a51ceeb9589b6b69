//! The storage backend contract and the registry that fans mutations out.
//!
//! Reads are always answered by local storage. Mutations run against every
//! registered backend in reverse order, remote first, so a remote can stamp
//! its issue id onto an entry before the local store persists it. A failing
//! remote is logged and skipped; the local store stays the store of record.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    config,
    error::{Error, Result},
    github::GithubBackend,
    model::Entry,
    store::Store,
};

/// Whether a mutation changed anything, or was already satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Noop,
}

/// What a backend did with a removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The entry is gone from this backend.
    Deleted,
    /// The backend cannot delete, so it closed the entry instead.
    ClosedInstead,
}

/// Tag selection for listings.
///
/// An empty filter matches everything; otherwise an entry matches when it
/// carries at least one of the wanted tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter(Vec<String>);

impl TagFilter {
    #[must_use]
    pub const fn any() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        Self(tags.into_iter().collect())
    }

    /// Parse a comma-separated tag list. Blank input matches everything.
    #[must_use]
    pub fn parse(csv: &str) -> Self {
        Self(
            csv.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.0.is_empty() || self.0.iter().any(|tag| tags.contains(tag))
    }
}

/// A place entries live: the local SQLite store, or a remote mirror.
///
/// Mutating calls take the entry by reference and persist the change; reads
/// rebuild full [`Entry`] values including tags and history where the backend
/// has them.
pub trait Backend {
    /// Short stable name used in logs and removal summaries.
    fn name(&self) -> &'static str;

    /// Entries matching `filter`, restricted to a single entry when `id` is
    /// given. Sorted for listing: `doing` first, then `backlog`, then `done`.
    fn fetch_entries(&self, filter: &TagFilter, id: Option<i64>) -> Result<Vec<Entry>>;

    /// Tags promoted to feature headings.
    fn fetch_features(&self) -> Result<BTreeSet<String>>;

    /// Persist a new entry. Implementations stamp ids back onto `entry`:
    /// the local store assigns `entry.id`, a remote assigns `entry.remote_id`.
    fn add_entry(&mut self, entry: &mut Entry) -> Result<()>;

    /// Replace the entry's message.
    fn update_entry(&mut self, entry: &mut Entry, msg: &str) -> Result<()>;

    /// Attach a tag. Returns [`Change::Noop`] when the tag was already there.
    fn tag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change>;

    /// Detach a tag. Returns [`Change::Noop`] when the tag was not there.
    fn untag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change>;

    /// Promote a tag to a feature heading.
    fn add_feature(&mut self, tag: &str) -> Result<()>;

    /// Demote a feature heading back to a plain tag.
    fn remove_feature(&mut self, tag: &str) -> Result<()>;

    /// Move the entry to `doing`, optionally with a deadline.
    fn start_entry(&mut self, entry: &Entry, deadline: Option<DateTime<Utc>>) -> Result<()>;

    /// Move the entry to `done`.
    fn end_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Move the entry back to `backlog`.
    fn backlog_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Remove the entry, or close it where the backend cannot delete.
    fn remove_entry(&mut self, entry: &Entry) -> Result<RemoveOutcome>;
}

/// The remote backend kinds this binary knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Github,
}

impl BackendKind {
    pub const ALL: &'static [Self] = &[Self::Github];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Github => "github",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name.trim())
    }

    /// Build a connected backend of this kind from stored configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration or credentials are missing.
    pub fn connect(self, store: &Store) -> Result<Box<dyn Backend>> {
        match self {
            Self::Github => Ok(Box::new(GithubBackend::from_store(store)?)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The local store plus an optional remote mirror, addressed as one unit.
pub struct Registry {
    local: Store,
    remote: Option<Box<dyn Backend>>,
}

impl Registry {
    /// A registry with no remote attached.
    #[must_use]
    pub fn new(local: Store) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// A registry with an explicit remote. Mostly useful for tests.
    #[must_use]
    pub fn with_remote(local: Store, remote: Box<dyn Backend>) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    /// Build a registry from the plugin flags stored in project config.
    ///
    /// # Errors
    ///
    /// Returns an error if config cannot be read or an active remote cannot
    /// be constructed. The message carries the detach hint so a broken remote
    /// never locks the user out for good.
    pub fn from_config(local: Store) -> Result<Self> {
        let mut remote: Option<Box<dyn Backend>> = None;
        for name in config::active_plugins(&local)? {
            let Some(kind) = BackendKind::from_name(&name) else {
                warn!(plugin = %name, "unknown storage plugin in config; ignoring");
                continue;
            };
            if remote.is_some() {
                warn!(plugin = %name, "multiple remote plugins configured; keeping the first");
                continue;
            }
            let backend = kind.connect(&local).map_err(|error| {
                Error::Config(format!(
                    "remote '{kind}' is configured but unusable ({error}); \
                     run `pb remote rm {kind}` to detach it"
                ))
            })?;
            remote = Some(backend);
        }
        Ok(Self { local, remote })
    }

    #[must_use]
    pub fn local(&self) -> &Store {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Store {
        &mut self.local
    }

    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    #[must_use]
    pub fn remote_name(&self) -> Option<&'static str> {
        self.remote.as_ref().map(|backend| backend.name())
    }

    /// Split into the local store and the remote, for callers that need to
    /// drive both sides at once.
    pub fn split_mut(&mut self) -> (&mut Store, Option<&mut (dyn Backend + 'static)>) {
        (&mut self.local, self.remote.as_deref_mut())
    }

    /// Entries matching `filter`, served from local storage only.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails.
    pub fn entries(&self, filter: &TagFilter) -> Result<Vec<Entry>> {
        self.local.fetch_entries(filter, None)
    }

    /// A single entry by local id, served from local storage only.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails.
    pub fn entry(&self, id: i64) -> Result<Option<Entry>> {
        Ok(self
            .local
            .fetch_entries(&TagFilter::any(), Some(id))?
            .pop())
    }

    /// Feature tags, served from local storage only.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails.
    pub fn features(&self) -> Result<BTreeSet<String>> {
        self.local.fetch_features()
    }

    /// Run a mutation against the remote first, then the local store.
    ///
    /// Remote failures are logged and skipped; the local result is the one
    /// returned. Sync will repair the remote side on a later pass.
    fn fan_out<T>(&mut self, mut op: impl FnMut(&mut dyn Backend) -> Result<T>) -> Result<T> {
        if let Some(remote) = self.remote.as_deref_mut() {
            if let Err(error) = op(remote) {
                warn!(
                    backend = remote.name(),
                    %error,
                    "remote mutation failed; applying locally anyway"
                );
            }
        }
        op(&mut self.local)
    }

    /// Add an entry everywhere. The remote runs first so its issue id lands
    /// on `entry` before the local store persists the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn add_entry(&mut self, entry: &mut Entry) -> Result<()> {
        self.fan_out(|backend| backend.add_entry(entry))
    }

    /// Replace an entry's message everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn update_entry(&mut self, entry: &mut Entry, msg: &str) -> Result<()> {
        self.fan_out(|backend| backend.update_entry(entry, msg))
    }

    /// Attach a tag everywhere. The returned change is the local one.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn tag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        self.fan_out(|backend| backend.tag_entry(entry, tag))
    }

    /// Detach a tag everywhere. The returned change is the local one.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn untag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        self.fan_out(|backend| backend.untag_entry(entry, tag))
    }

    /// Promote a tag to a feature everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn add_feature(&mut self, tag: &str) -> Result<()> {
        self.fan_out(|backend| backend.add_feature(tag))
    }

    /// Demote a feature everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn remove_feature(&mut self, tag: &str) -> Result<()> {
        self.fan_out(|backend| backend.remove_feature(tag))
    }

    /// Start an entry everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn start_entry(&mut self, entry: &Entry, deadline: Option<DateTime<Utc>>) -> Result<()> {
        self.fan_out(|backend| backend.start_entry(entry, deadline))
    }

    /// Finish an entry everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn end_entry(&mut self, entry: &Entry) -> Result<()> {
        self.fan_out(|backend| backend.end_entry(entry))
    }

    /// Send an entry back to the backlog everywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn backlog_entry(&mut self, entry: &Entry) -> Result<()> {
        self.fan_out(|backend| backend.backlog_entry(entry))
    }

    /// Remove an entry everywhere, reporting what each backend did.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn remove_entry(&mut self, entry: &Entry) -> Result<Vec<BackendRemoval>> {
        let mut removals = Vec::new();
        if let Some(remote) = self.remote.as_deref_mut() {
            let backend = remote.name();
            match remote.remove_entry(entry) {
                Ok(outcome) => removals.push(BackendRemoval { backend, outcome }),
                Err(error) => {
                    warn!(backend, %error, "remote removal failed; removing locally anyway");
                }
            }
        }
        let outcome = self.local.remove_entry(entry)?;
        removals.push(BackendRemoval {
            backend: self.local.name(),
            outcome,
        });
        Ok(removals)
    }
}

/// One backend's answer to a removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendRemoval {
    pub backend: &'static str,
    pub outcome: RemoveOutcome,
}
