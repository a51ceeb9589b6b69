//! Local SQLite storage: the store of record for a pebble project.

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use crate::{
    backend::{Backend, Change, RemoveOutcome, TagFilter},
    config, db,
    error::{Error, Result},
    model::{Entry, Event, EventKind, State, datetime_from_us, sort_entries},
};

/// SQLite-backed storage. One instance owns one connection to the project
/// database; every mutation commits in its own transaction.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the project database at `path` and make sure the
    /// project has a stable id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open(path)?;
        let mut store = Self { conn };
        store.ensure_project_id()?;
        Ok(store)
    }

    /// Fully migrated in-memory store. Test-friendly.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_project_id()?;
        Ok(store)
    }

    /// The project id doubles as the key for per-project secrets, so it is
    /// assigned once on first open and never changes.
    fn ensure_project_id(&mut self) -> Result<()> {
        if self.config_get(config::PROJECT_ID)?.is_none() {
            let id = format!("{:016x}", rand::random::<u64>());
            self.config_set(config::PROJECT_ID, &id)?;
        }
        Ok(())
    }

    /// Read one config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Insert or replace one config value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete one config value. Deleting a missing key is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn config_delete(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    /// All config pairs whose key starts with `prefix`, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn config_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM config WHERE key LIKE ?1 || '%' ORDER BY key",
        )?;
        let rows = stmt.query_map([prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    /// Link a local entry to its remote issue. The link is write-once: once
    /// an entry points at a remote issue it never silently points elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchEntry`] for unknown ids and
    /// [`Error::RemoteIdConflict`] when the entry is already linked to a
    /// different issue.
    pub fn set_remote_id(&mut self, id: i64, remote_id: &str) -> Result<()> {
        let existing: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT remote_id FROM entries WHERE entry_id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Err(Error::NoSuchEntry { id });
        };
        match existing {
            Some(existing) if existing != remote_id => Err(Error::RemoteIdConflict {
                id,
                existing,
                requested: remote_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.conn.execute(
                    "UPDATE entries SET remote_id = ?1 WHERE entry_id = ?2",
                    params![remote_id, id],
                )?;
                Ok(())
            }
        }
    }

    /// Tag usage histogram, sorted by tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tag_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, COUNT(entry_id) FROM entry_tags GROUP BY tag ORDER BY tag",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn tags_by_entry(&self) -> Result<HashMap<i64, BTreeSet<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_id, tag FROM entry_tags")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut tags: HashMap<i64, BTreeSet<String>> = HashMap::new();
        for row in rows {
            let (entry_id, tag) = row?;
            tags.entry(entry_id).or_default().insert(tag);
        }
        Ok(tags)
    }

    fn history_by_entry(&self) -> Result<HashMap<i64, Vec<Event>>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, event, date_us FROM history ORDER BY date_us, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            let entry_id: i64 = row.get(0)?;
            let event: String = row.get(1)?;
            let date_us: i64 = row.get(2)?;
            let kind = event.parse::<EventKind>().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error))
            })?;
            Ok(Event {
                entry: entry_id,
                kind,
                date: datetime_from_us(date_us),
            })
        })?;
        let mut history: HashMap<i64, Vec<Event>> = HashMap::new();
        for row in rows {
            let event = row?;
            history.entry(event.entry).or_default().push(event);
        }
        Ok(history)
    }

    fn deadlines_by_entry(&self) -> Result<HashMap<i64, DateTime<Utc>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_id, date_us FROM deadlines")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut deadlines = HashMap::new();
        for row in rows {
            let (entry_id, date_us) = row?;
            deadlines.insert(entry_id, datetime_from_us(date_us));
        }
        Ok(deadlines)
    }

    /// State changes share one shape: flip the row, append the matching
    /// history event, and keep the deadline consistent, all in one commit.
    fn change_state(
        &mut self,
        entry: &Entry,
        state: State,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let id = local_id(entry)?;
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE entries SET state = ?1 WHERE entry_id = ?2",
            params![state.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NoSuchEntry { id });
        }
        tx.execute(
            "INSERT INTO history (entry_id, event, date_us) VALUES (?1, ?2, ?3)",
            params![id, state.event().as_str(), now.timestamp_micros()],
        )?;
        match (state, deadline) {
            (State::Doing, Some(date)) => {
                tx.execute(
                    "INSERT OR REPLACE INTO deadlines (entry_id, date_us) VALUES (?1, ?2)",
                    params![id, date.timestamp_micros()],
                )?;
            }
            (State::Doing, None) => {}
            // a deadline only makes sense while the entry is in progress
            _ => {
                tx.execute("DELETE FROM deadlines WHERE entry_id = ?1", [id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl Backend for Store {
    fn name(&self) -> &'static str {
        "local"
    }

    fn fetch_entries(&self, filter: &TagFilter, id: Option<i64>) -> Result<Vec<Entry>> {
        let mut tags = self.tags_by_entry()?;
        let mut history = self.history_by_entry()?;
        let mut deadlines = self.deadlines_by_entry()?;

        let rows: Vec<(i64, Entry)> = match id {
            Some(wanted) => {
                let mut stmt = self.conn.prepare(
                    "SELECT entry_id, msg, points, state, remote_id
                     FROM entries WHERE entry_id = ?1",
                )?;
                let mapped = stmt.query_map([wanted], row_to_entry)?;
                mapped.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT entry_id, msg, points, state, remote_id FROM entries",
                )?;
                let mapped = stmt.query_map([], row_to_entry)?;
                mapped.collect::<rusqlite::Result<_>>()?
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (entry_id, mut entry) in rows {
            entry.tags = tags.remove(&entry_id).unwrap_or_default();
            entry.history = history.remove(&entry_id).unwrap_or_default();
            entry.deadline = deadlines.remove(&entry_id);
            if filter.matches(&entry.tags) {
                entries.push(entry);
            }
        }
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn fetch_features(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare("SELECT tag FROM features")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut features = BTreeSet::new();
        for row in rows {
            features.insert(row?);
        }
        Ok(features)
    }

    fn add_entry(&mut self, entry: &mut Entry) -> Result<()> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO entries (msg, points, state, remote_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.msg,
                i64::from(entry.points.max(1)),
                entry.state.as_str(),
                entry.remote_id
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO history (entry_id, event, date_us) VALUES (?1, ?2, ?3)",
            params![id, EventKind::Create.as_str(), now.timestamp_micros()],
        )?;
        // Entries can arrive already started or finished (a pulled remote
        // issue, say); record the state event so the trail stays complete.
        if entry.state != State::Backlog {
            tx.execute(
                "INSERT INTO history (entry_id, event, date_us) VALUES (?1, ?2, ?3)",
                params![id, entry.state.event().as_str(), now.timestamp_micros()],
            )?;
        }
        for tag in &entry.tags {
            tx.execute(
                "INSERT OR IGNORE INTO entry_tags (entry_id, tag) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }
        tx.commit()?;

        entry.id = Some(id);
        entry.history.insert(
            0,
            Event {
                entry: id,
                kind: EventKind::Create,
                date: now,
            },
        );
        if entry.state != State::Backlog {
            entry.history.push(Event {
                entry: id,
                kind: entry.state.event(),
                date: now,
            });
        }
        Ok(())
    }

    fn update_entry(&mut self, entry: &mut Entry, msg: &str) -> Result<()> {
        let id = local_id(entry)?;
        let updated = self.conn.execute(
            "UPDATE entries SET msg = ?1 WHERE entry_id = ?2",
            params![msg, id],
        )?;
        if updated == 0 {
            return Err(Error::NoSuchEntry { id });
        }
        entry.msg = msg.to_string();
        Ok(())
    }

    fn tag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        let id = local_id(entry)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO entry_tags (entry_id, tag) VALUES (?1, ?2)",
            params![id, tag],
        )?;
        Ok(if inserted > 0 {
            Change::Applied
        } else {
            Change::Noop
        })
    }

    fn untag_entry(&mut self, entry: &Entry, tag: &str) -> Result<Change> {
        let id = local_id(entry)?;
        let deleted = self.conn.execute(
            "DELETE FROM entry_tags WHERE entry_id = ?1 AND tag = ?2",
            params![id, tag],
        )?;
        Ok(if deleted > 0 {
            Change::Applied
        } else {
            Change::Noop
        })
    }

    fn add_feature(&mut self, tag: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO features (tag) VALUES (?1)",
            [tag],
        )?;
        Ok(())
    }

    fn remove_feature(&mut self, tag: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM features WHERE tag = ?1", [tag])?;
        Ok(())
    }

    fn start_entry(&mut self, entry: &Entry, deadline: Option<DateTime<Utc>>) -> Result<()> {
        self.change_state(entry, State::Doing, deadline)
    }

    fn end_entry(&mut self, entry: &Entry) -> Result<()> {
        self.change_state(entry, State::Done, None)
    }

    fn backlog_entry(&mut self, entry: &Entry) -> Result<()> {
        self.change_state(entry, State::Backlog, None)
    }

    fn remove_entry(&mut self, entry: &Entry) -> Result<RemoveOutcome> {
        let id = local_id(entry)?;
        let deleted = self
            .conn
            .execute("DELETE FROM entries WHERE entry_id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::NoSuchEntry { id });
        }
        Ok(RemoveOutcome::Deleted)
    }
}

fn local_id(entry: &Entry) -> Result<i64> {
    entry.id.ok_or(Error::MissingLocalId)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(i64, Entry)> {
    let id: i64 = row.get(0)?;
    let msg: String = row.get(1)?;
    let points: i64 = row.get(2)?;
    let state: String = row.get(3)?;
    let remote_id: Option<String> = row.get(4)?;
    let state = state.parse::<State>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error))
    })?;
    Ok((
        id,
        Entry {
            id: Some(id),
            state,
            msg,
            points: u32::try_from(points).unwrap_or(1),
            remote_id,
            tags: BTreeSet::new(),
            history: Vec::new(),
            deadline: None,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::{Store, local_id};
    use crate::{
        backend::{Backend, Change, RemoveOutcome, TagFilter},
        config,
        error::Error,
        model::{Entry, EventKind, State},
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn store() -> Store {
        Store::open_in_memory().expect("open in-memory store")
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(ToString::to_string).collect()
    }

    fn add(store: &mut Store, msg: &str, points: u32, tags: &[&str]) -> Entry {
        let mut entry = Entry::new(msg, points, tag_set(tags));
        store.add_entry(&mut entry).expect("add entry");
        entry
    }

    #[test]
    fn add_assigns_id_and_records_create_first() {
        let mut store = store();
        let entry = add(&mut store, "first", 2, &["bug"]);
        assert_eq!(entry.id, Some(1));
        assert_eq!(entry.history[0].kind, EventKind::Create);

        let fetched = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(fetched.msg, "first");
        assert_eq!(fetched.points, 2);
        assert_eq!(fetched.state, State::Backlog);
        assert_eq!(fetched.tags, tag_set(&["bug"]));
        assert_eq!(fetched.history.len(), 1);
        assert_eq!(fetched.history[0].kind, EventKind::Create);
    }

    #[test]
    fn add_finished_entry_records_done_event_too() {
        let mut store = store();
        let mut entry = Entry::new("imported closed issue", 1, BTreeSet::new());
        entry.state = State::Done;
        entry.remote_id = Some("17".into());
        store.add_entry(&mut entry).expect("add entry");

        let fetched = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(fetched.state, State::Done);
        assert_eq!(fetched.remote_id.as_deref(), Some("17"));
        assert!(fetched.done_date().is_some());
        assert_eq!(fetched.history[0].kind, EventKind::Create);
    }

    #[test]
    fn fetch_applies_tag_filter_with_or_semantics() {
        let mut store = store();
        add(&mut store, "a", 1, &["bug"]);
        add(&mut store, "b", 1, &["ui"]);
        add(&mut store, "c", 1, &["infra"]);

        let hits = store
            .fetch_entries(&TagFilter::parse("bug,ui"), None)
            .expect("fetch");
        let msgs: Vec<&str> = hits.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(msgs, vec!["b", "a"]);
    }

    #[test]
    fn tag_and_untag_report_noops() {
        let mut store = store();
        let entry = add(&mut store, "x", 1, &[]);

        assert_eq!(store.tag_entry(&entry, "bug").expect("tag"), Change::Applied);
        assert_eq!(store.tag_entry(&entry, "bug").expect("tag"), Change::Noop);
        assert_eq!(
            store.untag_entry(&entry, "bug").expect("untag"),
            Change::Applied
        );
        assert_eq!(
            store.untag_entry(&entry, "bug").expect("untag"),
            Change::Noop
        );
    }

    #[test]
    fn start_sets_deadline_and_end_clears_it() {
        let mut store = store();
        let entry = add(&mut store, "x", 1, &[]);
        let deadline = Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts");

        store.start_entry(&entry, Some(deadline)).expect("start");
        let doing = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(doing.state, State::Doing);
        assert_eq!(doing.deadline, Some(deadline));

        store.end_entry(&entry).expect("end");
        let done = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(done.state, State::Done);
        assert_eq!(done.deadline, None);
        assert!(done.done_date().is_some());

        let kinds: Vec<EventKind> = done.history.iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Create, EventKind::Doing, EventKind::Done]
        );
    }

    #[test]
    fn backlog_reopens_a_finished_entry() {
        let mut store = store();
        let entry = add(&mut store, "x", 1, &[]);
        store.end_entry(&entry).expect("end");
        store.backlog_entry(&entry).expect("backlog");

        let reopened = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(reopened.state, State::Backlog);
        assert!(reopened.is_open());
    }

    #[test]
    fn update_replaces_message() {
        let mut store = store();
        let mut entry = add(&mut store, "old", 1, &[]);
        store
            .update_entry(&mut entry, "new\n\nwith body")
            .expect("update");
        assert_eq!(entry.msg, "new\n\nwith body");

        let fetched = store
            .fetch_entries(&TagFilter::any(), entry.id)
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(fetched.summary(), "new");
        assert_eq!(fetched.body(), Some("with body"));
    }

    #[test]
    fn remove_cascades_to_tags_and_history() {
        let mut store = store();
        let entry = add(&mut store, "x", 1, &["bug", "ui"]);

        let outcome = store.remove_entry(&entry).expect("remove");
        assert_eq!(outcome, RemoveOutcome::Deleted);
        assert!(store
            .fetch_entries(&TagFilter::any(), None)
            .expect("fetch")
            .is_empty());
        assert!(store.tag_counts().expect("tag counts").is_empty());

        let err = store.remove_entry(&entry).expect_err("already gone");
        assert!(matches!(err, Error::NoSuchEntry { id: 1 }));
    }

    #[test]
    fn set_remote_id_is_write_once() {
        let mut store = store();
        let entry = add(&mut store, "x", 1, &[]);
        let id = entry.id.expect("id");

        store.set_remote_id(id, "42").expect("first link");
        store.set_remote_id(id, "42").expect("same link is fine");

        let err = store.set_remote_id(id, "43").expect_err("relink refused");
        assert!(matches!(err, Error::RemoteIdConflict { .. }));

        let fetched = store
            .fetch_entries(&TagFilter::any(), Some(id))
            .expect("fetch")
            .pop()
            .expect("entry exists");
        assert_eq!(fetched.remote_id.as_deref(), Some("42"));
    }

    #[test]
    fn features_roundtrip() {
        let mut store = store();
        store.add_feature("checkout").expect("add feature");
        store.add_feature("checkout").expect("idempotent");
        store.add_feature("search").expect("add feature");

        let features = store.fetch_features().expect("features");
        assert_eq!(features, tag_set(&["checkout", "search"]));

        store.remove_feature("search").expect("remove feature");
        let features = store.fetch_features().expect("features");
        assert_eq!(features, tag_set(&["checkout"]));
    }

    #[test]
    fn config_roundtrip_and_prefix_scan() {
        let mut store = store();
        store.config_set("plugin.github", "on").expect("set");
        store.config_set("github.api.user", "alice").expect("set");

        assert_eq!(
            store.config_get("plugin.github").expect("get").as_deref(),
            Some("on")
        );
        assert_eq!(store.config_get("missing").expect("get"), None);

        let plugins = store.config_prefixed("plugin.").expect("prefixed");
        assert_eq!(plugins, vec![("plugin.github".to_string(), "on".to_string())]);

        store.config_delete("plugin.github").expect("delete");
        assert!(store.config_prefixed("plugin.").expect("prefixed").is_empty());
    }

    #[test]
    fn open_assigns_a_project_id() {
        let store = store();
        let project = store
            .config_get(config::PROJECT_ID)
            .expect("get")
            .expect("project id assigned");
        assert_eq!(project.len(), 16);
        assert!(project.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tag_counts_group_by_tag() {
        let mut store = store();
        add(&mut store, "a", 1, &["bug", "ui"]);
        add(&mut store, "b", 1, &["bug"]);

        let counts = store.tag_counts().expect("tag counts");
        assert_eq!(
            counts,
            vec![("bug".to_string(), 2), ("ui".to_string(), 1)]
        );
    }

    #[test]
    fn operations_on_unpersisted_entries_fail_cleanly() {
        let mut store = store();
        let ghost = Entry::new("never added", 1, BTreeSet::new());
        assert!(local_id(&ghost).is_err());
        assert!(matches!(
            store.tag_entry(&ghost, "bug"),
            Err(Error::MissingLocalId)
        ));
    }
}
