use std::{cmp::Reverse, collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three lifecycle states of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Backlog,
    Doing,
    Done,
}

impl State {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Doing => "doing",
            Self::Done => "done",
        }
    }

    /// Listing order: in-progress work first, finished work last.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Doing => 0,
            Self::Backlog => 1,
            Self::Done => 2,
        }
    }

    /// The history event recorded when an entry moves into this state.
    #[must_use]
    pub const fn event(self) -> EventKind {
        match self {
            Self::Backlog => EventKind::Backlog,
            Self::Doing => EventKind::Doing,
            Self::Done => EventKind::Done,
        }
    }
}

/// What happened to an entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Backlog,
    Doing,
    Done,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Backlog => "backlog",
            Self::Doing => "doing",
            Self::Done => "done",
        }
    }
}

/// One timestamped lifecycle event of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub entry: i64,
    pub kind: EventKind,
    pub date: DateTime<Utc>,
}

/// A unit of work: a free-form message, a point estimate, tags, and a
/// lifecycle trail.
///
/// `id` is `None` until the local store persists the entry; `remote_id` is
/// `None` until a remote backend accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Option<i64>,
    pub state: State,
    pub msg: String,
    pub points: u32,
    pub remote_id: Option<String>,
    pub tags: BTreeSet<String>,
    pub history: Vec<Event>,
    pub deadline: Option<DateTime<Utc>>,
}

impl Entry {
    /// A fresh, unpersisted backlog entry.
    #[must_use]
    pub fn new(msg: impl Into<String>, points: u32, tags: BTreeSet<String>) -> Self {
        Self {
            id: None,
            state: State::Backlog,
            msg: msg.into(),
            points,
            remote_id: None,
            tags,
            history: Vec::new(),
            deadline: None,
        }
    }

    /// First line of the message.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.msg.lines().next().unwrap_or("")
    }

    /// Everything after the first line, with separating blank lines dropped.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        let (_, rest) = self.msg.split_once('\n')?;
        let rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() { None } else { Some(rest) }
    }

    /// Creation time, derived from the `create` history event.
    #[must_use]
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .find(|event| event.kind == EventKind::Create)
            .map(|event| event.date)
    }

    /// Completion time, derived from the most recent `done` history event.
    #[must_use]
    pub fn done_date(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|event| event.kind == EventKind::Done)
            .map(|event| event.date)
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, State::Done)
    }
}

/// Sort for listings: `doing` before `backlog` before `done`, newest first
/// within each state.
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by_key(|entry| (entry.state.rank(), Reverse(entry.id.unwrap_or(0))));
}

/// Decode a persisted microsecond timestamp, clamping anything unrepresentable
/// to the epoch.
#[must_use]
pub(crate) fn datetime_from_us(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backlog" => Ok(Self::Backlog),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "state",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for EventKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "backlog" => Ok(Self::Backlog),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "event",
                got: s.to_string(),
            }),
        }
    }
}
