//! Physical database connections.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use lock_api::ArcReentrantMutexGuard;
use parking_lot::{RawMutex, RawThreadId, ReentrantMutex};
use rusqlite::Connection;

use crate::config::{ConnectionParams, Driver};
use crate::error::PoolError;
use crate::pool::BorrowRelease;

/// SQL dialect spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SqlDialect {
    /// SQLite.
    Sqlite,
}

impl SqlDialect {
    /// Character that delimits string literals.
    #[must_use]
    pub fn string_quote(self) -> char {
        match self {
            Self::Sqlite => '\'',
        }
    }

    /// Character that delimits identifiers.
    #[must_use]
    pub fn identifier_quote(self) -> char {
        match self {
            Self::Sqlite => '"',
        }
    }
}

impl From<Driver> for SqlDialect {
    fn from(driver: Driver) -> Self {
        match driver {
            Driver::Sqlite => Self::Sqlite,
        }
    }
}

/// An open, named database connection.
///
/// Dereferences to [`rusqlite::Connection`] for running statements. The
/// connection closes when dropped; use [`close()`](DbConnection::close) to
/// observe close errors.
#[derive(Debug)]
pub struct DbConnection {
    name: String,
    dialect: SqlDialect,
    conn: Connection,
}

impl DbConnection {
    /// Open a connection from `params` under the given name.
    pub fn open(params: &ConnectionParams, name: impl Into<String>) -> Result<Self, PoolError> {
        let name = name.into();

        if params.host.is_some() || params.username.is_some() {
            tracing::debug!(
                connection = %name,
                driver = %params.driver,
                "ignoring host and credentials for embedded database"
            );
        }

        let conn = Connection::open_with_flags(&params.database, params.open_flags())
            .and_then(|conn| {
                configure(&conn, params)?;
                Ok(conn)
            })
            .map_err(|source| PoolError::Open {
                name: name.clone(),
                source,
            })?;

        tracing::debug!(
            connection = %name,
            database = %params.database,
            read_only = params.read_only,
            "opened database connection"
        );

        Ok(Self {
            name,
            dialect: params.driver.into(),
            conn,
        })
    }

    /// Unique name of this connection within its pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SQL dialect of this connection.
    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Close the connection, reporting any error from the database client.
    pub fn close(self) -> Result<(), PoolError> {
        let Self { name, conn, .. } = self;
        match conn.close() {
            Ok(()) => {
                tracing::debug!(connection = %name, "closed database connection");
                Ok(())
            }
            Err((_conn, source)) => Err(PoolError::Close { name, source }),
        }
    }
}

impl Deref for DbConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

fn configure(conn: &Connection, params: &ConnectionParams) -> rusqlite::Result<()> {
    conn.busy_timeout(params.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", params.foreign_keys)?;
    if let Some(mode) = params.journal_mode {
        let actual: String =
            conn.pragma_update_and_check(None, "journal_mode", mode.as_str(), |row| row.get(0))?;
        if !actual.eq_ignore_ascii_case(mode.as_str()) {
            tracing::warn!(
                requested = mode.as_str(),
                actual = %actual,
                "database did not switch journal mode"
            );
        }
    }
    Ok(())
}

/// Connection storage shared between a pool slot and its borrowers.
pub(crate) type SharedConnection = Arc<ReentrantMutex<DbConnection>>;

/// Borrow of the calling thread's pooled connection.
///
/// Dereferences to [`DbConnection`]. Bound to the thread that obtained it.
/// Nested borrows on the same thread are allowed. A borrow keeps the
/// connection open after the thread's last handle is dropped; it closes when
/// the last borrow goes away, unless the thread acquires it again first.
pub struct ConnectionRef {
    guard: ArcReentrantMutexGuard<RawMutex, RawThreadId, DbConnection>,
    // Dropped after `guard`.
    _release: BorrowRelease,
    _not_send: PhantomData<*const ()>,
}

impl ConnectionRef {
    pub(crate) fn new(connection: SharedConnection, release: BorrowRelease) -> Self {
        Self {
            guard: connection.lock_arc(),
            _release: release,
            _not_send: PhantomData,
        }
    }

    /// Whether both borrows refer to the same physical connection.
    #[must_use]
    pub fn same_connection(&self, other: &ConnectionRef) -> bool {
        std::ptr::eq::<DbConnection>(&*self.guard, &*other.guard)
    }
}

impl Deref for ConnectionRef {
    type Target = DbConnection;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::fmt::Debug for ConnectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRef")
            .field("name", &self.guard.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalMode;

    #[test]
    fn test_open_in_memory() {
        let conn = DbConnection::open(&ConnectionParams::in_memory(), "test-1").unwrap();
        assert_eq!(conn.name(), "test-1");
        assert_eq!(conn.dialect(), SqlDialect::Sqlite);

        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
        conn.close().unwrap();
    }

    #[test]
    fn test_open_applies_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.sqlite");
        let params = ConnectionParams::sqlite(path.to_string_lossy())
            .foreign_keys(true)
            .journal_mode(JournalMode::Wal);

        let conn = DbConnection::open(&params, "test-1").unwrap();
        let fk: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(fk);
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn test_open_missing_file_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sqlite");
        let params = ConnectionParams::sqlite(path.to_string_lossy()).create_if_missing(false);

        let err = DbConnection::open(&params, "test-7").unwrap_err();
        assert!(matches!(err, PoolError::Open { .. }));
        assert_eq!(err.connection_name(), Some("test-7"));
    }

    #[test]
    fn test_dialect_quotes() {
        assert_eq!(SqlDialect::Sqlite.string_quote(), '\'');
        assert_eq!(SqlDialect::Sqlite.identifier_quote(), '"');
    }
}
