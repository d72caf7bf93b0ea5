//! Connection parameters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::OpenFlags;

use crate::error::PoolError;

/// Database path that opens a private in-memory SQLite database.
pub const IN_MEMORY: &str = ":memory:";

/// Database driver used to open physical connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Driver {
    /// Embedded SQLite database file.
    #[default]
    Sqlite,
}

impl Driver {
    /// Canonical driver name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Driver {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "qsqlite" => Ok(Self::Sqlite),
            _ => Err(PoolError::UnsupportedDriver(name.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SQLite journal mode applied after opening a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Rollback journal deleted at the end of each transaction.
    Delete,
    /// Rollback journal truncated instead of deleted.
    Truncate,
    /// Rollback journal header zeroed instead of deleted.
    Persist,
    /// Rollback journal kept in memory.
    Memory,
    /// Write-ahead log.
    Wal,
    /// No rollback journal.
    Off,
}

impl JournalMode {
    /// Pragma value for this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for JournalMode {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "persist" => Ok(Self::Persist),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            "off" => Ok(Self::Off),
            other => Err(PoolError::Config(format!("invalid journal mode: {other}"))),
        }
    }
}

/// Parameters used to open every physical connection of a pool.
///
/// Host and credentials are carried for drivers that need them; the embedded
/// SQLite driver ignores them.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Database driver.
    pub driver: Driver,

    /// Server hostname, if the driver talks to a server.
    pub host: Option<String>,

    /// Database name. For SQLite this is the file path or [`IN_MEMORY`].
    pub database: String,

    /// User name.
    pub username: Option<String>,

    /// Password.
    pub password: Option<String>,

    /// Open the database read-only.
    pub read_only: bool,

    /// Create the database file if it does not exist yet.
    pub create_if_missing: bool,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints.
    pub foreign_keys: bool,

    /// Journal mode to switch to after opening, if any.
    pub journal_mode: Option<JournalMode>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            driver: Driver::Sqlite,
            host: None,
            database: String::new(),
            username: None,
            password: None,
            read_only: false,
            create_if_missing: true,
            busy_timeout: Duration::from_millis(5000),
            foreign_keys: true,
            journal_mode: None,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("read_only", &self.read_only)
            .field("create_if_missing", &self.create_if_missing)
            .field("busy_timeout", &self.busy_timeout)
            .field("foreign_keys", &self.foreign_keys)
            .field("journal_mode", &self.journal_mode)
            .finish()
    }
}

impl ConnectionParams {
    /// Parameters for the SQLite database at `path`.
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }

    /// Parameters for private in-memory SQLite databases.
    ///
    /// Every connection opened from these parameters sees its own empty
    /// database, so threads of the same pool do not share data.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::sqlite(IN_MEMORY)
    }

    /// Parse a connection string into parameters.
    ///
    /// Keys are case-insensitive and separated by `;`:
    /// ```text
    /// Driver=sqlite;Database=/home/dj/library.sqlite;Journal Mode=wal;
    /// ```
    ///
    /// A value containing `;` is wrapped in braces, with `}}` standing for a
    /// literal `}`. Braced values are taken verbatim:
    /// ```text
    /// Database={/music/a;b/library.sqlite};Password={p;w}}d}
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self, PoolError> {
        let mut params = Self::default();

        for (key, value) in split_connection_string(conn_str)? {
            let value = value.as_str();
            match key.as_str() {
                "driver" => params.driver = value.parse()?,
                "database" | "data source" | "dbname" => params.database = value.to_string(),
                "host" | "hostname" | "server" => params.host = non_empty(value),
                "user" | "user id" | "uid" | "username" => params.username = non_empty(value),
                "password" | "pwd" => params.password = non_empty(value),
                "readonly" | "read only" => params.read_only = parse_bool(&key, value)?,
                "create" | "create if missing" => {
                    params.create_if_missing = parse_bool(&key, value)?;
                }
                "busy timeout" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| PoolError::Config(format!("invalid busy timeout: {value}")))?;
                    params.busy_timeout = Duration::from_millis(millis);
                }
                "foreign keys" => params.foreign_keys = parse_bool(&key, value)?,
                "journal mode" => params.journal_mode = Some(value.parse()?),
                _ => {
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        Ok(params)
    }

    /// Whether every connection opened from these parameters gets its own
    /// private database (`:memory:` or an empty name).
    #[must_use]
    pub fn is_private_database(&self) -> bool {
        let database = self.database.trim();
        database.is_empty() || database == IN_MEMORY
    }

    /// Check that the parameters can be used to open connections.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.database.trim().is_empty() {
            return Err(PoolError::Config("database name must not be empty".into()));
        }
        if self.read_only && self.journal_mode == Some(JournalMode::Wal) {
            return Err(PoolError::Config(
                "journal mode cannot be changed on a read-only database".into(),
            ));
        }
        if self.is_private_database() {
            warn_private_database(&self.database);
        }
        Ok(())
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set user name and password.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Open the database read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Create the database file if it is missing.
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement.
    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the journal mode.
    #[must_use]
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }

    /// SQLite open flags derived from these parameters.
    ///
    /// Connections are never shared between threads, so SQLite's own
    /// per-connection mutex is disabled.
    #[must_use]
    pub fn open_flags(&self) -> OpenFlags {
        let mode = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else if self.create_if_missing {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

pub(crate) fn warn_private_database(database: &str) {
    tracing::warn!(
        database = %database,
        "private database: each connection will see its own empty database"
    );
}

/// Split a connection string into lowercased keys and their values.
fn split_connection_string(conn_str: &str) -> Result<Vec<(String, String)>, PoolError> {
    let mut pairs = Vec::new();
    let mut chars = conn_str.chars().peekable();

    loop {
        let mut key = String::new();
        while let Some(c) = chars.next_if(|&c| c != '=' && c != ';') {
            key.push(c);
        }
        match chars.next() {
            Some('=') => {}
            // A part without '=' is only allowed when it is blank.
            end => {
                if !key.trim().is_empty() {
                    return Err(PoolError::Config(format!("invalid key-value: {}", key.trim())));
                }
                if end.is_none() {
                    break;
                }
                continue;
            }
        }
        let key = key.trim().to_lowercase();

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let value = if chars.next_if_eq(&'{').is_some() {
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('}') if chars.next_if_eq(&'}').is_some() => value.push('}'),
                    Some('}') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(PoolError::Config(format!("unterminated braced value for {key}")));
                    }
                }
            }
            while let Some(c) = chars.next() {
                if c == ';' {
                    break;
                }
                if !c.is_whitespace() {
                    return Err(PoolError::Config(format!(
                        "unexpected '{c}' after braced value for {key}"
                    )));
                }
            }
            value
        } else {
            let mut value = String::new();
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                value.push(c);
            }
            value.trim().to_string()
        };

        pairs.push((key, value));
    }

    Ok(pairs)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PoolError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(PoolError::Config(format!("invalid value for {key}: {value}"))),
    }
}
