//! `DuckDB` connection reuse.
//!
//! A single database instance is opened per file and every handed-out
//! connection is a clone of it, so loads and queries in one process never
//! contend for the file lock.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;
use tracing::debug;

use crate::WarehouseError;

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    root: Mutex<Option<Connection>>,
    idle: Mutex<Vec<Connection>>,
}

/// Hands out connections to one `DuckDB` database file.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Create a manager for `path`, keeping at most `max_idle` spare connections.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                root: Mutex::new(None),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Acquire a connection, opening the database on first use.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or a pool lock
    /// was poisoned by an earlier panic.
    pub fn acquire(&self) -> Result<PooledConnection, WarehouseError> {
        let reused = self
            .inner
            .idle
            .lock()
            .map_err(|_| WarehouseError::PoolPoisoned)?
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => self.clone_root()?,
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    fn clone_root(&self) -> Result<Connection, WarehouseError> {
        let mut root = self
            .inner
            .root
            .lock()
            .map_err(|_| WarehouseError::PoolPoisoned)?;

        if root.is_none() {
            debug!(path = %self.inner.db_path.display(), "opening duckdb database");
            let connection = Connection::open(&self.inner.db_path)?;
            connection.execute_batch("PRAGMA disable_progress_bar;")?;
            *root = Some(connection);
        }

        match root.as_ref() {
            Some(connection) => Ok(connection.try_clone()?),
            None => Err(WarehouseError::PoolPoisoned),
        }
    }
}

/// A connection that returns to its manager when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if let Ok(mut idle) = self.pool.idle.lock() {
            if idle.len() < self.pool.max_idle {
                idle.push(connection);
            }
        }
    }
}
