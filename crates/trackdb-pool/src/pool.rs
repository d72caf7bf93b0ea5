//! Per-thread connection pool.
//!
//! Each thread that acquires a [`PooledConnection`](crate::PooledConnection)
//! gets its own physical connection, opened on first acquisition and closed
//! when the thread's last handle is dropped.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{ConnectionParams, warn_private_database};
use crate::connection::{ConnectionRef, DbConnection};
use crate::error::PoolError;
use crate::registry::{Release, Slot, SlotRegistry, ThreadToken};

/// Base name used when none is configured.
pub const DEFAULT_BASE_NAME: &str = "trackdb";

/// Shared handle to a [`ConnectionPool`].
pub type ConnectionPoolPtr = Arc<ConnectionPool>;

/// A pool of database connections, one per thread.
///
/// All connections are opened with the same [`ConnectionParams`] and named
/// `<base name>-<n>`, where `n` increases with every connection the pool
/// opens. Connections are never shared between threads.
///
/// # Example
///
/// ```rust,no_run
/// use trackdb_pool::{ConnectionParams, ConnectionPool, PooledConnection};
///
/// let pool = ConnectionPool::create(ConnectionParams::sqlite("library.sqlite"), "library");
///
/// let handle = PooledConnection::new(&pool)?;
/// let tables: i64 = pool
///     .thread_local_connection()
///     .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))?;
/// println!("{tables} schema objects");
/// drop(handle);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    /// Template for every physical connection.
    params: ConnectionParams,

    /// Common prefix of all connection names.
    base_name: String,

    /// Counter for generating connection names.
    next_connection_id: AtomicU64,

    /// Open connections by thread.
    slots: SlotRegistry,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Connections opened.
    connections_opened: u64,
    /// Connections closed by the pool.
    connections_closed: u64,
    /// Failed opens.
    open_failures: u64,
    /// Closes that reported an error.
    close_failures: u64,
    /// Connections closed because their thread exited without releasing them.
    reaped_on_thread_exit: u64,
}

impl ConnectionPool {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a pool that opens connections from `params`.
    ///
    /// No connection is opened until a thread acquires one. The parameters
    /// are not validated; see [`PoolBuilder::build`] for that.
    pub fn create(params: ConnectionParams, base_name: impl Into<String>) -> ConnectionPoolPtr {
        let base_name = base_name.into();
        if params.is_private_database() {
            warn_private_database(&params.database);
        }

        tracing::info!(
            connection_name = %base_name,
            driver = %params.driver,
            database = %params.database,
            "connection pool created"
        );

        Arc::new(Self {
            shared: Arc::new(PoolShared {
                params,
                base_name,
                next_connection_id: AtomicU64::new(1),
                slots: SlotRegistry::default(),
                created_at: Instant::now(),
                metrics: Mutex::new(PoolMetricsInner::default()),
            }),
        })
    }

    /// The connection of the calling thread.
    ///
    /// The returned borrow is only usable on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread holds no [`PooledConnection`]
    /// for this pool. Connections are never opened implicitly.
    ///
    /// [`PooledConnection`]: crate::PooledConnection
    #[track_caller]
    #[allow(clippy::panic)]
    #[must_use]
    pub fn thread_local_connection(&self) -> ConnectionRef {
        let token = ThreadToken::current();
        match self.shared.slots.get(token) {
            Some(connection) => ConnectionRef::new(
                connection,
                BorrowRelease {
                    pool: Arc::clone(&self.shared),
                    token,
                },
            ),
            None => panic!(
                "no database connection for thread {token} in pool '{}': \
                 acquire a PooledConnection first",
                self.shared.base_name
            ),
        }
    }

    /// Whether the calling thread currently holds a connection of this pool.
    #[must_use]
    pub fn has_thread_local_connection(&self) -> bool {
        self.shared.slots.contains(ThreadToken::current())
    }

    /// Open the calling thread's connection, or add a holder to it if it is
    /// already open.
    ///
    /// Open failures are returned as is; they are not retried.
    pub(crate) fn create_thread_local_connection(&self) -> Result<(), PoolError> {
        let token = ThreadToken::current();
        if self.shared.slots.acquire_existing(token) {
            tracing::trace!(thread = %token, "reusing thread-local connection");
            return Ok(());
        }

        let name = self.shared.next_connection_name();
        match DbConnection::open(&self.shared.params, name) {
            Ok(connection) => {
                tracing::debug!(
                    thread = %token,
                    connection = %connection.name(),
                    "created thread-local connection"
                );
                self.shared.slots.insert(token, connection);
                self.shared.metrics.lock().connections_opened += 1;
                watch_thread_exit(&self.shared);
                Ok(())
            }
            Err(e) => {
                self.shared.metrics.lock().open_failures += 1;
                tracing::warn!(thread = %token, error = %e, "failed to create thread-local connection");
                Err(e)
            }
        }
    }

    /// Release one holder of the calling thread's connection, closing it
    /// when no holder remains. Does nothing if the thread has none.
    pub(crate) fn destroy_thread_local_connection(&self) {
        let token = ThreadToken::current();
        match self.shared.slots.release(token) {
            Release::NotHeld => {
                tracing::trace!(thread = %token, "no thread-local connection to release");
            }
            Release::StillHeld(holders) => {
                tracing::trace!(thread = %token, holders, "thread-local connection still held");
            }
            Release::Borrowed => {
                tracing::debug!(
                    thread = %token,
                    "thread-local connection still borrowed, closing with its last borrow"
                );
            }
            Release::Removed(slot) => {
                tracing::debug!(
                    thread = %token,
                    connection = %slot.name,
                    "destroying thread-local connection"
                );
                self.shared.close_slot(slot);
            }
        }
    }

    /// Common prefix of all connection names.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.shared.base_name
    }

    /// Parameters used to open connections.
    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.shared.params
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            open_connections: self.shared.slots.len(),
            next_connection_id: self.shared.next_connection_id.load(Ordering::Acquire),
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.shared.metrics.lock();
        PoolMetrics {
            connections_opened: inner.connections_opened,
            connections_closed: inner.connections_closed,
            open_failures: inner.open_failures,
            close_failures: inner.close_failures,
            reaped_on_thread_exit: inner.reaped_on_thread_exit,
            uptime: self.shared.created_at.elapsed(),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("base_name", &self.shared.base_name)
            .field("params", &self.shared.params)
            .field("status", &self.status())
            .finish()
    }
}

impl PoolShared {
    fn next_connection_name(&self) -> String {
        let id = self.next_connection_id.fetch_add(1, Ordering::AcqRel);
        format!("{}-{}", self.base_name, id)
    }

    fn close_slot(&self, slot: Slot) {
        let Slot {
            name, connection, ..
        } = slot;

        match Arc::try_unwrap(connection) {
            Ok(connection) => {
                self.metrics.lock().connections_closed += 1;
                if let Err(e) = connection.into_inner().close() {
                    self.metrics.lock().close_failures += 1;
                    tracing::warn!(connection = %name, error = %e, "error while closing connection");
                }
            }
            Err(_leaked) => {
                // Only a leaked ConnectionRef keeps the Arc alive here.
                tracing::error!(
                    connection = %name,
                    "connection removed while a leaked borrow still holds it"
                );
            }
        }
    }

    /// Close the thread's connection once its last borrow is gone and no
    /// handle holds it anymore.
    fn release_borrow(&self, token: ThreadToken) {
        if let Some(slot) = self.slots.remove_unused(token) {
            tracing::debug!(
                thread = %token,
                connection = %slot.name,
                "destroying thread-local connection after its last borrow"
            );
            self.close_slot(slot);
        }
    }

    /// Close a connection whose thread exited without releasing it.
    fn reap_thread(&self, token: ThreadToken) {
        if let Some(slot) = self.slots.remove(token) {
            tracing::error!(
                thread = %token,
                connection = %slot.name,
                pool = %self.base_name,
                "thread exited without releasing its database connection"
            );
            self.metrics.lock().reaped_on_thread_exit += 1;
            self.close_slot(slot);
        }
    }
}

/// Notifies the pool when a [`ConnectionRef`] goes away.
pub(crate) struct BorrowRelease {
    pool: Arc<PoolShared>,
    token: ThreadToken,
}

impl Drop for BorrowRelease {
    fn drop(&mut self) {
        self.pool.release_borrow(self.token);
    }
}

thread_local! {
    static EXIT_SWEEP: ExitSweep = ExitSweep::new();
}

/// Closes leftover connections of the owning thread when it exits.
struct ExitSweep {
    token: ThreadToken,
    pools: RefCell<Vec<Weak<PoolShared>>>,
}

impl ExitSweep {
    fn new() -> Self {
        Self {
            token: ThreadToken::current(),
            pools: RefCell::new(Vec::new()),
        }
    }

    fn watch(&self, pool: &Arc<PoolShared>) {
        let pool = Arc::downgrade(pool);
        let mut pools = self.pools.borrow_mut();
        pools.retain(|watched| watched.strong_count() > 0);
        if !pools.iter().any(|watched| watched.ptr_eq(&pool)) {
            pools.push(pool);
        }
    }
}

impl Drop for ExitSweep {
    fn drop(&mut self) {
        for pool in self.pools.get_mut().drain(..) {
            if let Some(pool) = pool.upgrade() {
                pool.reap_thread(self.token);
            }
        }
    }
}

fn watch_thread_exit(pool: &Arc<PoolShared>) {
    if EXIT_SWEEP.try_with(|sweep| sweep.watch(pool)).is_err() {
        tracing::warn!("thread is exiting, connection will not be reaped");
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use trackdb_pool::{ConnectionParams, ConnectionPool};
///
/// let pool = ConnectionPool::builder()
///     .params(ConnectionParams::sqlite("library.sqlite"))
///     .base_name("library")
///     .build()?;
/// # Ok::<(), trackdb_pool::PoolError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    params: Option<ConnectionParams>,
    base_name: String,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self {
            params: None,
            base_name: DEFAULT_BASE_NAME.to_string(),
        }
    }

    /// Set the connection parameters.
    #[must_use]
    pub fn params(mut self, params: ConnectionParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Parse the connection parameters from a connection string.
    pub fn connection_string(self, conn_str: &str) -> Result<Self, PoolError> {
        Ok(self.params(ConnectionParams::from_connection_string(conn_str)?))
    }

    /// Set the base name of generated connection names.
    #[must_use]
    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    /// Validate the settings and build the pool.
    pub fn build(self) -> Result<ConnectionPoolPtr, PoolError> {
        let params = self
            .params
            .ok_or_else(|| PoolError::Config("connection parameters are required".into()))?;
        params.validate()?;
        if self.base_name.trim().is_empty() {
            return Err(PoolError::Config("base name must not be empty".into()));
        }
        Ok(ConnectionPool::create(params, self.base_name))
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of open connections, one per thread at most.
    pub open_connections: usize,
    /// Suffix the next opened connection will be named with.
    pub next_connection_id: u64,
}

impl PoolStatus {
    /// Check if no thread holds a connection.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.open_connections == 0
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Connections opened since pool creation.
    pub connections_opened: u64,
    /// Connections closed since pool creation.
    pub connections_closed: u64,
    /// Connection opens that failed.
    pub open_failures: u64,
    /// Connection closes that reported an error.
    pub close_failures: u64,
    /// Connections closed because their thread exited while still holding
    /// them. Anything above zero indicates a leaked handle.
    pub reaped_on_thread_exit: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate open success rate (0.0 to 1.0).
    #[must_use]
    pub fn open_success_rate(&self) -> f64 {
        let total = self.connections_opened + self.open_failures;
        if total == 0 {
            return 1.0;
        }
        self.connections_opened as f64 / total as f64
    }

    /// Whether any connection had to be reaped instead of being released.
    #[must_use]
    pub fn has_leaks(&self) -> bool {
        self.reaped_on_thread_exit > 0
    }
}
