use std::io;

/// Errors that can occur while operating on a pebble project.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local SQLite storage error.
    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    /// I/O error while touching the database file or the token file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote API answered with a non-success status.
    #[error("remote API error - {status}: {message}")]
    RemoteApi { status: u16, message: String },

    /// The remote could not be reached or its answer could not be decoded.
    #[error("remote request failed: {0}")]
    RemoteTransport(String),

    /// No access token is stored for this project.
    #[error("no access token stored for project {project}")]
    MissingToken { project: String },

    /// Configuration is missing or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// The entry id does not exist in local storage.
    #[error("entry {id:04} does not exist")]
    NoSuchEntry { id: i64 },

    /// The entry has not been persisted locally, so it has no id yet.
    #[error("entry has no local id")]
    MissingLocalId,

    /// Refusing to rebind an entry that is already linked to a remote issue.
    #[error("entry {id:04} is already linked to remote issue {existing}; refusing to relink to {requested}")]
    RemoteIdConflict {
        id: i64,
        existing: String,
        requested: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
