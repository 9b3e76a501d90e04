//! Opening, initializing and sharing the application's SQLite database.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    cart::create_cart_entry_table,
    catalog::create_catalog_tables,
    customer::create_customer_table,
    database_id::DatabaseId,
    idempotency::create_request_key_table,
    order::create_order_tables,
};

/// How long an operation waits for the database before giving up with
/// [Error::StoreUnavailable].
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// A shared handle to the application's database connection.
///
/// Cloning the handle is cheap, all clones share the same connection.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl Database {
    /// Wrap `connection`, initializing the tables for the domain models.
    ///
    /// `timeout` bounds how long any single operation waits for the
    /// connection, both for the in-process lock and for SQLite's own locks.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(connection: Connection, timeout: Duration) -> Result<Self, Error> {
        connection.busy_timeout(timeout)?;
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            timeout,
        })
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, Error> {
        Self::new(Connection::open(path)?, timeout)
    }

    /// Create a database that only lives in memory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?, DEFAULT_STORE_TIMEOUT)
    }

    /// Acquire the connection, waiting at most the store timeout.
    ///
    /// This blocks the calling thread while it waits. Async code should use
    /// [Database::run] instead.
    ///
    /// # Errors
    /// Returns [Error::StoreUnavailable] if the connection could not be
    /// acquired in time or a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        let deadline = Instant::now() + self.timeout;

        loop {
            match self.connection.try_lock() {
                Ok(connection) => return Ok(connection),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(TryLockError::WouldBlock) => {
                    tracing::warn!(
                        "timed out after {:?} waiting for the database lock",
                        self.timeout
                    );
                    return Err(Error::StoreUnavailable);
                }
                Err(TryLockError::Poisoned(error)) => {
                    tracing::error!("could not acquire database lock: {error}");
                    return Err(Error::StoreUnavailable);
                }
            }
        }
    }

    /// Run `operation` with the connection on tokio's blocking thread pool.
    ///
    /// Waiting for the lock and for SQLite happens there, so a slow request
    /// does not hold up the async worker threads.
    ///
    /// # Errors
    /// Returns the error from `operation`, or [Error::StoreUnavailable] if the
    /// connection could not be acquired in time or `operation` panicked.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let database = self.clone();

        tokio::task::spawn_blocking(move || {
            let connection = database.lock()?;
            operation(&connection)
        })
        .await
        .map_err(|error| {
            tracing::error!("database task failed: {error}");
            Error::StoreUnavailable
        })?
    }
}

/// Create the tables for every domain model and seed the "All" category.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
/// Returns an error if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_id_sequence_table(&transaction)?;
    create_customer_table(&transaction)?;
    create_catalog_tables(&transaction)?;
    create_cart_entry_table(&transaction)?;
    create_order_tables(&transaction)?;
    create_request_key_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Start a transaction that takes the database write lock immediately.
///
/// Every read-then-write operation goes through one of these so that a
/// concurrent writer (in this process or another) cannot interleave between
/// the read and the write.
pub(crate) fn begin_immediate(connection: &Connection) -> Result<Transaction<'_>, Error> {
    Ok(Transaction::new_unchecked(
        connection,
        TransactionBehavior::Immediate,
    )?)
}

/// Allocate the next ID from the named sequence. IDs start at 1 and are never
/// reused.
pub(crate) fn next_id(sequence: &str, connection: &Connection) -> Result<DatabaseId, Error> {
    let id = connection.query_row(
        "INSERT INTO id_sequence (name, next_id) VALUES (?1, 2)
         ON CONFLICT(name) DO UPDATE SET next_id = next_id + 1
         RETURNING next_id - 1",
        [sequence],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Whether `error` is SQLite reporting a failed UNIQUE constraint.
pub(crate) fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                ..
            },
            _,
        )
    )
}

fn create_id_sequence_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS id_sequence (
            name TEXT PRIMARY KEY,
            next_id INTEGER NOT NULL
        )",
        (),
    )?;

    Ok(())
}
