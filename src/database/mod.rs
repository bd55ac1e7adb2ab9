use anyhow::{Result, Context};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use log::{debug, info};

use crate::config::DatabaseConfig;
use crate::ledger::LedgerResult;

pub mod migrations;
pub mod models;
pub mod repository;
mod schema;


pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Owned handle to the ledger's SQLite store
///
/// Cloning is cheap and shares the underlying connection pool. Every
/// connection handed out has foreign keys enabled and waits up to the
/// configured busy timeout for SQLite's write lock.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    /// Open (creating if needed) the database at `config.path` and migrate it
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let db_path = &config.path;

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .context("Failed to create database connection pool")?;

        let mut conn = pool.get().context("Failed to get a database connection")?;
        debug!("Opened database at {}", db_path);

        migrations::run_migrations(&mut conn).context("Failed to migrate database schema")?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> LedgerResult<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `work` as one atomic unit of work
    ///
    /// The transaction begins IMMEDIATE, so the write lock is held from the
    /// first read onwards and no other unit of work can change a balance
    /// between a check and the write that depends on it. The transaction
    /// commits only if `work` returns `Ok`; any error rolls everything back.
    pub fn unit_of_work<T, F>(&self, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&Transaction) -> LedgerResult<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = work(&tx)?;

        tx.commit()?;
        Ok(value)
    }
}
