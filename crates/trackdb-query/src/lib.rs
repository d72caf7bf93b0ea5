//! # trackdb-query
//!
//! Helpers for building SQL text by hand against the track library
//! database.
//!
//! - [`FieldEscaper`] quotes string literals in the dialect of a connection.
//! - [`SqlLikeWildcardEscaper`] escapes literal text for `LIKE` patterns.
//!
//! ## Example
//!
//! ```rust,no_run
//! use trackdb_pool::{ConnectionParams, ConnectionPool, PooledConnection};
//! use trackdb_query::{FieldEscaper, SqlLikeWildcardEscaper};
//!
//! let pool = ConnectionPool::create(ConnectionParams::sqlite("library.sqlite"), "library");
//! let handle = PooledConnection::new(&pool)?;
//! let conn = handle.connection();
//!
//! let escaper = FieldEscaper::new(&conn);
//! let artists = escaper.escape_strings(["Moderat", "Guns N' Roses"]).join(",");
//! let sql = format!("SELECT id FROM library WHERE artist IN ({artists})");
//!
//! let pattern = SqlLikeWildcardEscaper::contains_pattern("100%", '\\');
//! let mut stmt = conn.prepare(&format!("{sql} AND title LIKE ?1 ESCAPE '\\'"))?;
//! let ids: Vec<i64> = stmt
//!     .query_map([pattern], |row| row.get(0))?
//!     .collect::<Result<_, _>>()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod field;
pub mod like;

pub use field::FieldEscaper;
pub use like::{MATCH_ALL, MATCH_ONE, SqlLikeWildcardEscaper};
