//! # trackdb-pool
//!
//! Per-thread connection pool for the track library database.
//!
//! SQLite connections must not be used from several threads at once, so the
//! pool never shares one: every thread that needs the database acquires its
//! own connection through a scoped [`PooledConnection`] and reads it back with
//! [`ConnectionPool::thread_local_connection()`].
//!
//! ## Features
//!
//! - One lazily opened connection per thread and pool
//! - Unique connection names (`<base>-<n>`) for log correlation
//! - Scoped release on every exit path, nested handles share a connection
//! - Last-resort cleanup of connections leaked by exiting threads
//! - Connection-string parsing and SQLite pragma setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use trackdb_pool::{ConnectionParams, ConnectionPool, PooledConnection};
//!
//! let params = ConnectionParams::from_connection_string(
//!     "Driver=sqlite;Database=library.sqlite;Journal Mode=wal;",
//! )?;
//! let pool = ConnectionPool::create(params, "library");
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         let _handle = PooledConnection::new(&pool)?;
//!         let conn = pool.thread_local_connection();
//!         conn.execute("UPDATE library SET played = 1 WHERE id = ?1", [42])?;
//!         Ok(())
//!     });
//! });
//! # Ok::<(), trackdb_pool::PoolError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod pooled;
pub mod registry;

// Configuration
pub use config::{ConnectionParams, Driver, JournalMode};

// Error types
pub use error::PoolError;

// Connections
pub use connection::{ConnectionRef, DbConnection, SqlDialect};

// Pool types
pub use pool::{ConnectionPool, ConnectionPoolPtr, PoolBuilder, PoolMetrics, PoolStatus};
pub use pooled::PooledConnection;
pub use registry::ThreadToken;
