use std::path::Path;

use anyhow::{bail, Context, Result};
use hivemap_core::{ApiaryError, KeyValueStore};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use time::OffsetDateTime;

/// Ordered schema steps. The database's `user_version` records the last one applied.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: r"
CREATE TABLE IF NOT EXISTS kv_entries (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
",
}];

struct Migration {
    version: i64,
    sql: &'static str,
}

fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Durable key-value substrate for HiveMap data on a single `SQLite` database.
pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

impl SqliteStore {
    /// Open a SQLite-backed store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Schema version on disk, the version this build expects, and the steps in between.
    /// Reading the status never writes to the database.
    ///
    /// # Errors
    /// Returns an error when `user_version` cannot be read.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let current_version = user_version(&self.conn)?;
        let pending_versions = MIGRATIONS
            .iter()
            .map(|migration| migration.version)
            .filter(|version| *version > current_version)
            .collect();

        Ok(SchemaStatus { current_version, target_version: latest_version(), pending_versions })
    }

    /// Apply every pending migration, each in its own transaction.
    ///
    /// # Errors
    /// Returns an error when the database was written by a newer build or a step fails.
    pub fn migrate(&mut self) -> Result<()> {
        let current = user_version(&self.conn)?;
        if current > latest_version() {
            bail!(
                "database schema version {current} is newer than this build supports ({})",
                latest_version()
            );
        }

        for migration in MIGRATIONS.iter().filter(|migration| migration.version > current) {
            let tx = self.conn.transaction().context("failed to start migration transaction")?;
            tx.execute_batch(migration.sql)
                .with_context(|| format!("failed to apply migration v{}", migration.version))?;
            tx.pragma_update(None, "user_version", migration.version)
                .with_context(|| format!("failed to record migration v{}", migration.version))?;
            tx.commit().context("failed to commit migration")?;
            tracing::info!(version = migration.version, "applied sqlite schema migration");
        }
        Ok(())
    }

    fn read_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_entries WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("failed to read key {key}"))
    }

    fn write_value(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "INSERT INTO kv_entries(key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("failed to write key {key}"))?;
        Ok(())
    }

    fn delete_value(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete key {key}"))?;
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_entries ORDER BY key")
            .context("failed to prepare key listing")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn replace_entries(&mut self, entries: &[(String, String)]) -> Result<()> {
        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start replace transaction")?;
        tx.execute("DELETE FROM kv_entries", []).context("failed to clear kv_entries")?;
        {
            let mut insert = tx
                .prepare(
                    "INSERT OR REPLACE INTO kv_entries(key, value, updated_at) VALUES (?1, ?2, ?3)",
                )
                .context("failed to prepare replacement insert")?;
            for (key, value) in entries {
                insert
                    .execute(params![key, value, now])
                    .with_context(|| format!("failed to write key {key}"))?;
            }
        }
        tx.commit().context("failed to commit replace transaction")?;
        Ok(())
    }
}

fn storage_error(err: &anyhow::Error) -> ApiaryError {
    tracing::warn!(error = %format!("{err:#}"), "sqlite store operation failed");
    ApiaryError::Storage(format!("{err:#}"))
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> hivemap_core::Result<Option<String>> {
        self.read_value(key).map_err(|err| storage_error(&err))
    }

    fn set(&mut self, key: &str, value: &str) -> hivemap_core::Result<()> {
        self.write_value(key, value).map_err(|err| storage_error(&err))
    }

    fn remove(&mut self, key: &str) -> hivemap_core::Result<()> {
        self.delete_value(key).map_err(|err| storage_error(&err))
    }

    fn keys(&self) -> hivemap_core::Result<Vec<String>> {
        self.list_keys().map_err(|err| storage_error(&err))
    }

    fn clear(&mut self) -> hivemap_core::Result<()> {
        self.replace_entries(&[]).map_err(|err| storage_error(&err))
    }

    fn replace_all(&mut self, entries: &[(String, String)]) -> hivemap_core::Result<()> {
        self.replace_entries(entries).map_err(|err| storage_error(&err))
    }
}

fn user_version(conn: &Connection) -> Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0))
        .context("failed to read schema version")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}
