//! Canonical SQLite schema for a pebble project database.
//!
//! The schema is normalized around one row per entry:
//! - `entries` keeps the latest aggregate fields for each entry
//! - `entry_tags` models the many-to-many tag relationship
//! - `history` preserves the timestamped lifecycle trail
//! - `deadlines` and `features` hold per-entry deadlines and promoted tags
//! - `config` is a key/value store for project settings
//!
//! Migration v1 mirrors the unversioned legacy file format (a flat `entry`
//! table with embedded timestamps), so databases written by old releases and
//! fresh databases both take the same upgrade path.

/// Migration v1: the legacy flat layout.
///
/// Old databases already contain these tables at `user_version` 0; `IF NOT
/// EXISTS` makes this a no-op for them and a staging step for new files.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS entry (
    created TEXT,
    done TEXT,
    msg TEXT,
    points INTEGER,
    state TEXT
);

CREATE TABLE IF NOT EXISTS tag (
    tag TEXT,
    entry INTEGER
);
";

/// Migration v2: the normalized layout, with data carried over from v1.
///
/// Legacy timestamps are `YYYY-MM-DD HH:MM:SS` UTC strings; they become
/// microsecond epoch integers here. Legacy `open` rows become `backlog`, and
/// the embedded created/done columns become synthesized history events.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    entry_id INTEGER PRIMARY KEY,
    msg TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 1 CHECK (points > 0),
    state TEXT NOT NULL DEFAULT 'backlog' CHECK (state IN ('backlog', 'doing', 'done')),
    remote_id TEXT
);

CREATE TABLE IF NOT EXISTS entry_tags (
    entry_id INTEGER NOT NULL REFERENCES entries(entry_id) ON DELETE CASCADE,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    PRIMARY KEY (entry_id, tag)
);

CREATE TABLE IF NOT EXISTS history (
    entry_id INTEGER NOT NULL REFERENCES entries(entry_id) ON DELETE CASCADE,
    event TEXT NOT NULL CHECK (event IN ('create', 'backlog', 'doing', 'done')),
    date_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS features (
    tag TEXT PRIMARY KEY CHECK (length(trim(tag)) > 0)
);

CREATE TABLE IF NOT EXISTS deadlines (
    entry_id INTEGER PRIMARY KEY REFERENCES entries(entry_id) ON DELETE CASCADE,
    date_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT INTO entries (entry_id, msg, points, state, remote_id)
SELECT rowid,
       COALESCE(msg, ''),
       MAX(COALESCE(points, 1), 1),
       CASE
           WHEN state = 'done' THEN 'done'
           WHEN state = 'doing' THEN 'doing'
           ELSE 'backlog'
       END,
       NULL
FROM entry;

INSERT INTO history (entry_id, event, date_us)
SELECT rowid, 'create', CAST(strftime('%s', created) AS INTEGER) * 1000000
FROM entry
WHERE created IS NOT NULL;

INSERT INTO history (entry_id, event, date_us)
SELECT rowid, 'done', CAST(strftime('%s', done) AS INTEGER) * 1000000
FROM entry
WHERE done IS NOT NULL;

INSERT OR IGNORE INTO entry_tags (entry_id, tag)
SELECT DISTINCT entry, tag
FROM tag
WHERE entry IN (SELECT entry_id FROM entries)
  AND tag IS NOT NULL
  AND length(trim(tag)) > 0;

DROP TABLE entry;
DROP TABLE tag;
";

/// Migration v3: read-path indexes.
pub const MIGRATION_V3_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_state
    ON entries(state, entry_id DESC);

CREATE INDEX IF NOT EXISTS idx_entry_tags_tag
    ON entry_tags(tag, entry_id);

CREATE INDEX IF NOT EXISTS idx_history_entry_date
    ON history(entry_id, date_us);
";

/// Indexes that must exist after migrating to the latest version.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_entries_state",
    "idx_entry_tags_tag",
    "idx_history_entry_date",
];
