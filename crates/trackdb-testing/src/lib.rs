//! # trackdb-testing
//!
//! Test infrastructure for the track library database crates.
//!
//! - [`TestDatabase`]: a SQLite file in a temporary directory, removed on drop
//! - [`init_tracing()`]: route `tracing` output to the test harness

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use trackdb_pool::{ConnectionParams, ConnectionPool, ConnectionPoolPtr, JournalMode};

/// Install a test-friendly `tracing` subscriber once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A library database file that lives as long as this value.
#[derive(Debug)]
pub struct TestDatabase {
    dir: TempDir,
    path: PathBuf,
}

impl TestDatabase {
    /// File name of the database inside its temporary directory.
    pub const FILE_NAME: &'static str = "library.sqlite";

    /// Create an empty temporary directory for the database.
    ///
    /// The file itself is created by the first connection.
    pub fn new() -> std::io::Result<Self> {
        init_tracing();
        let dir = tempfile::Builder::new().prefix("trackdb-").tempdir()?;
        let path = dir.path().join(Self::FILE_NAME);
        tracing::debug!(path = %path.display(), "created test database directory");
        Ok(Self { dir, path })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary directory holding the database.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Connection parameters for this database in WAL mode, so that
    /// connections of different threads can read while one writes.
    #[must_use]
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::sqlite(self.path.to_string_lossy()).journal_mode(JournalMode::Wal)
    }

    /// A pool over this database.
    #[must_use]
    pub fn pool(&self, base_name: &str) -> ConnectionPoolPtr {
        ConnectionPool::create(self.params(), base_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_directory_is_removed() {
        let db = TestDatabase::new().unwrap();
        let dir = db.dir().to_path_buf();
        assert!(dir.exists());
        assert!(db.path().ends_with(TestDatabase::FILE_NAME));
        drop(db);
        assert!(!dir.exists());
    }

    #[test]
    fn test_params_point_at_database() {
        let db = TestDatabase::new().unwrap();
        let params = db.params();
        assert_eq!(Path::new(&params.database), db.path());
        assert_eq!(params.journal_mode, Some(JournalMode::Wal));
    }
}
