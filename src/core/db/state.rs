use std::{
    ops::{Deref, DerefMut},
    path::PathBuf,
};

use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::core::db::{
    error::Result,
    schema::{self, Schema},
};

/// How to reach the database file.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: PathBuf,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl StoreOptions {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
            create_if_missing: true,
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
    }
}

pub(super) struct StoreState {
    options: StoreOptions,
    schema_version: u32,
    pool: RwLock<SqlitePool>,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("path", &self.options.path)
            .field("schema_version", &self.schema_version)
            .finish()
    }
}

impl StoreState {
    /// Opens the pool and upgrades the database to `schema` before anything
    /// else can reach it.
    pub(super) async fn open(options: StoreOptions, schema: &Schema) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(options.connect_options())
            .await?;

        let schema_version = {
            let mut conn = pool.acquire().await?;
            schema::migrate(&mut conn, schema).await
        };
        let schema_version = match schema_version {
            Ok(version) => version,
            Err(err) => {
                pool.close().await;
                return Err(err);
            }
        };

        info!(path = ?options.path, schema_version, "opened store");
        Ok(Self {
            options,
            schema_version,
            pool: RwLock::new(pool),
        })
    }

    pub(super) fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Acquire a pooled connection and hold the pool read lock for the entire lifetime
    /// of the returned guard.
    pub(super) async fn conn(&self) -> Result<DbConnGuard<'_>> {
        let pool_guard = self.pool.read().await;

        // Acquire while the read lock is held; the guard keeps it held.
        let conn = pool_guard.acquire().await?;

        Ok(DbConnGuard {
            _pool_guard: pool_guard,
            conn,
        })
    }

    /// Waits for in-flight operations, folds the WAL into the main file and
    /// closes the pool. Later operations fail.
    pub(super) async fn close(&self) -> Result<()> {
        let pool_guard = self.pool.write().await;
        if pool_guard.is_closed() {
            return Ok(());
        }
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&*pool_guard)
            .await?;
        pool_guard.close().await;
        debug!(path = ?self.options.path, "closed store");
        Ok(())
    }
}

pub(super) struct DbConnGuard<'a> {
    _pool_guard: RwLockReadGuard<'a, SqlitePool>,
    conn: PoolConnection<Sqlite>,
}

impl<'a> Deref for DbConnGuard<'a> {
    type Target = PoolConnection<Sqlite>;
    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'a> DerefMut for DbConnGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
