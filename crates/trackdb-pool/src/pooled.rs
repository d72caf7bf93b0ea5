//! Scoped acquisition of thread-local connections.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::connection::ConnectionRef;
use crate::error::PoolError;
use crate::pool::ConnectionPoolPtr;

/// Holds the calling thread's connection of a pool for as long as it lives.
///
/// Creating a `PooledConnection` opens the thread's connection if it is not
/// open yet; dropping the last one on a thread closes it again, on every exit
/// path including unwinding. Handles nest: an inner handle on the same thread
/// shares the outer handle's connection. A [`ConnectionRef`] still alive when
/// the last handle drops delays the close until it is dropped too.
///
/// The handle keeps the pool alive and cannot leave its thread.
///
/// ```rust,no_run
/// use trackdb_pool::{ConnectionParams, ConnectionPool, PooledConnection};
///
/// let pool = ConnectionPool::create(ConnectionParams::sqlite("library.sqlite"), "library");
/// let handle = PooledConnection::new(&pool)?;
/// handle.connection().execute_batch("CREATE TABLE IF NOT EXISTS crates (name TEXT)")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PooledConnection {
    pool: ConnectionPoolPtr,
    _not_send: PhantomData<*const ()>,
}

impl PooledConnection {
    /// Acquire the calling thread's connection of `pool`.
    pub fn new(pool: &ConnectionPoolPtr) -> Result<Self, PoolError> {
        pool.create_thread_local_connection()?;
        tracing::trace!(pool = %pool.base_name(), "acquired thread-local connection");
        Ok(Self {
            pool: Arc::clone(pool),
            _not_send: PhantomData,
        })
    }

    /// Borrow the connection held by this handle.
    #[must_use]
    pub fn connection(&self) -> ConnectionRef {
        self.pool.thread_local_connection()
    }

    /// The pool this handle belongs to.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPoolPtr {
        &self.pool
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.destroy_thread_local_connection();
    }
}
