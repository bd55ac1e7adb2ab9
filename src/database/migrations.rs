use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

use super::schema;

type Migration = fn(&Connection) -> Result<()>;

/// Step `n` takes the schema from version `n` to `n + 1`
const MIGRATIONS: &[Migration] = &[schema::create_schema];

pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Apply every step past the stored version inside one transaction
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction().context("Failed to start transaction for migrations")?;

    let version = get_database_version(&tx)?;
    let pending = MIGRATIONS.get(version as usize..).unwrap_or_default();
    if pending.is_empty() {
        debug!("Ledger schema at version {}", version);
        return Ok(());
    }

    for (step, migrate) in (version..).zip(pending) {
        debug!("Ledger schema {} -> {}", step, step + 1);
        (*migrate)(&tx).with_context(|| format!("Ledger schema step {} -> {} failed", step, step + 1))?;
    }

    tx.execute("UPDATE database_version SET version = ?1", [CURRENT_VERSION])
        .context("Failed to record schema version")?;
    tx.commit().context("Failed to commit schema migration")?;

    info!("Ledger schema migrated from version {} to {}", version, CURRENT_VERSION);
    Ok(())
}

/// Stored schema version. A fresh database is recorded as version 0.
pub fn get_database_version(conn: &Connection) -> Result<u32> {
    conn.execute("CREATE TABLE IF NOT EXISTS database_version (version INTEGER NOT NULL)", [])
        .context("Failed to create database_version table")?;

    let stored: Option<u32> = conn
        .query_row("SELECT version FROM database_version", [], |row| row.get(0))
        .optional()
        .context("Failed to read schema version")?;

    match stored {
        Some(version) => Ok(version),
        None => {
            conn.execute("INSERT INTO database_version (version) VALUES (0)", [])
                .context("Failed to seed schema version")?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_database_starts_at_version_zero() {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("ledger.db")).unwrap();

        assert_eq!(get_database_version(&conn).unwrap(), 0);
        assert_eq!(get_database_version(&conn).unwrap(), 0);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM database_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_run_migrations_is_repeatable() {
        let dir = tempdir().unwrap();
        let mut conn = Connection::open(dir.path().join("ledger.db")).unwrap();

        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        assert_eq!(get_database_version(&conn).unwrap(), CURRENT_VERSION);

        let accounts_exist: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='accounts')",
            [],
            |row| row.get(0),
        ).unwrap();
        assert!(accounts_exist);
    }

    #[test]
    fn test_newer_database_is_left_alone() {
        let dir = tempdir().unwrap();
        let mut conn = Connection::open(dir.path().join("ledger.db")).unwrap();
        get_database_version(&conn).unwrap();
        conn.execute("UPDATE database_version SET version = ?1", [CURRENT_VERSION + 1]).unwrap();

        run_migrations(&mut conn).unwrap();

        assert_eq!(get_database_version(&conn).unwrap(), CURRENT_VERSION + 1);
    }
}
