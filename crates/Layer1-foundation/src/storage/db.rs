//! SQLite grant store
//!
//! 영속 권한(persisted grant) 저장:
//! - 키: (app_id, path, mode)
//! - 상태: active / inactive
//!
//! 설정 데이터는 JSON (storage/json/)에서 관리
//!
//! ## Migration System
//!
//! Database schema is versioned. Migrations run automatically on open.
//! - Version 1: Initial schema (persisted_grants)
//! - Version 2: Add activated_at column

use crate::permission::{normalize_path, OperationMode};
use crate::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Database file name inside the data directory
pub const GRANTS_DB_FILE: &str = "grants.db";

impl ToSql for OperationMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code() as i64))
    }
}

impl FromSql for OperationMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        u32::try_from(code)
            .ok()
            .and_then(|c| OperationMode::from_code(c).ok())
            .ok_or(FromSqlError::OutOfRange(code))
    }
}

/// Identity of one grant inside an app's namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub path: String,
    pub mode: OperationMode,
}

impl GrantKey {
    /// The path is stored in its lexical normal form, so aliases share one key
    pub fn new(path: impl AsRef<Path>, mode: OperationMode) -> Self {
        Self {
            path: normalize_path(path.as_ref()).to_string_lossy().into_owned(),
            mode,
        }
    }
}

/// Persisted grant record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedGrant {
    pub app_id: String,
    pub path: String,
    pub mode: OperationMode,
    pub granting_app: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub activated_at: Option<String>,
}

/// Result of a batch that requires every key to already exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// All keys existed; the change was committed
    Applied(usize),
    /// Indices of keys with no record; nothing was changed
    Missing(Vec<usize>),
}

impl BatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BatchOutcome::Applied(_))
    }
}

/// Durable store for persisted grants
pub struct GrantStore {
    conn: Mutex<Connection>,
}

impl GrantStore {
    /// Open (or create) the store in `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(GRANTS_DB_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.initialize_schema()?;
        store.run_migrations()?;

        debug!(path = %db_path.display(), "grant store opened");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.initialize_schema()?;
        store.run_migrations()?;

        Ok(store)
    }

    /// Flush and close the underlying connection
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
        conn.close()
            .map_err(|(_, e)| Error::Storage(format!("Failed to close database: {}", e)))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Get current schema version from database
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS persisted_grants (
                app_id TEXT NOT NULL,
                path TEXT NOT NULL,
                mode INTEGER NOT NULL CHECK(mode IN (1, 2)),
                granting_app TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (app_id, path, mode)
            );

            CREATE INDEX IF NOT EXISTS idx_grants_path
                ON persisted_grants(path);

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!(
                "Grant store schema is up to date (version {})",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running grant store migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self.lock()?;

        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => Self::migrate_v2(&conn)?,
                _ => {
                    warn!("Unknown migration version: {}", version);
                }
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration to version {}", version);
        }

        Ok(())
    }

    /// Migration to version 2: track when a grant was last activated
    fn migrate_v2(conn: &Connection) -> Result<()> {
        if Self::has_column(conn, "persisted_grants", "activated_at")? {
            debug!("activated_at column already present");
            return Ok(());
        }

        conn.execute(
            "ALTER TABLE persisted_grants ADD COLUMN activated_at TEXT",
            [],
        )
        .map_err(|e| Error::Storage(format!("Failed to add activated_at column: {}", e)))?;
        Ok(())
    }

    fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to inspect table {}: {}", table, e)))
    }

    // ========================================================================
    // Batch Mutations
    // ========================================================================

    /// Upsert every key as an active grant of `app_id`
    pub fn persist_batch(&self, app_id: &str, granting_app: &str, keys: &[GrantKey]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO persisted_grants
                        (app_id, path, mode, granting_app, active, created_at, updated_at, activated_at)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, ?5)
                    ON CONFLICT(app_id, path, mode) DO UPDATE SET
                        granting_app = excluded.granting_app,
                        active = 1,
                        updated_at = excluded.updated_at,
                        activated_at = excluded.activated_at
                    "#,
                )
                .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

            for key in keys {
                stmt.execute(params![app_id, key.path, key.mode, granting_app, now])
                    .map_err(|e| Error::Storage(format!("Failed to persist grant: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit: {}", e)))?;

        Ok(())
    }

    /// Delete every key; nothing changes unless all of them exist
    pub fn revoke_batch(&self, app_id: &str, keys: &[GrantKey]) -> Result<BatchOutcome> {
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let missing = Self::missing_keys(&tx, app_id, keys)?;
        if !missing.is_empty() {
            return Ok(BatchOutcome::Missing(missing));
        }

        {
            let mut stmt = tx
                .prepare("DELETE FROM persisted_grants WHERE app_id = ?1 AND path = ?2 AND mode = ?3")
                .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;
            for key in keys {
                stmt.execute(params![app_id, key.path, key.mode])
                    .map_err(|e| Error::Storage(format!("Failed to revoke grant: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit: {}", e)))?;

        Ok(BatchOutcome::Applied(keys.len()))
    }

    /// Toggle `active` on every key; nothing changes unless all of them exist
    pub fn set_active_batch(
        &self,
        app_id: &str,
        keys: &[GrantKey],
        active: bool,
    ) -> Result<BatchOutcome> {
        let mut conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let missing = Self::missing_keys(&tx, app_id, keys)?;
        if !missing.is_empty() {
            return Ok(BatchOutcome::Missing(missing));
        }

        {
            let mut stmt = tx
                .prepare(
                    r#"
                    UPDATE persisted_grants SET
                        active = ?4,
                        updated_at = ?5,
                        activated_at = CASE WHEN ?4 = 1 THEN ?5 ELSE activated_at END
                    WHERE app_id = ?1 AND path = ?2 AND mode = ?3
                    "#,
                )
                .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;
            for key in keys {
                stmt.execute(params![app_id, key.path, key.mode, active, now])
                    .map_err(|e| Error::Storage(format!("Failed to update grant: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit: {}", e)))?;

        Ok(BatchOutcome::Applied(keys.len()))
    }

    fn missing_keys(conn: &Connection, app_id: &str, keys: &[GrantKey]) -> Result<Vec<usize>> {
        let mut stmt = conn
            .prepare(
                "SELECT 1 FROM persisted_grants WHERE app_id = ?1 AND path = ?2 AND mode = ?3",
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let mut missing = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            let found = stmt
                .exists(params![app_id, key.path, key.mode])
                .map_err(|e| Error::Storage(format!("Failed to query grant: {}", e)))?;
            if !found {
                missing.push(index);
            }
        }
        Ok(missing)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get one grant, active or not
    pub fn lookup(&self, app_id: &str, key: &GrantKey) -> Result<Option<PersistedGrant>> {
        let conn = self.lock()?;

        conn.query_row(
            r#"
            SELECT app_id, path, mode, granting_app, active, created_at, updated_at, activated_at
            FROM persisted_grants WHERE app_id = ?1 AND path = ?2 AND mode = ?3
            "#,
            params![app_id, key.path, key.mode],
            Self::row_to_grant,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get grant: {}", e)))
    }

    /// `true` per key iff an active grant exists; the whole batch is read under one lock
    pub fn check_batch(&self, app_id: &str, keys: &[GrantKey]) -> Result<Vec<bool>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT 1 FROM persisted_grants \
                 WHERE app_id = ?1 AND path = ?2 AND mode = ?3 AND active = 1",
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let mut checked = Vec::with_capacity(keys.len());
        for key in keys {
            let active = stmt
                .exists(params![app_id, key.path, key.mode])
                .map_err(|e| Error::Storage(format!("Failed to query grant: {}", e)))?;
            checked.push(active);
        }
        Ok(checked)
    }

    /// All grants of an app, ordered by path
    pub fn list(&self, app_id: &str) -> Result<Vec<PersistedGrant>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT app_id, path, mode, granting_app, active, created_at, updated_at, activated_at
                FROM persisted_grants WHERE app_id = ?1 ORDER BY path, mode
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let grants = stmt
            .query_map(params![app_id], Self::row_to_grant)
            .map_err(|e| Error::Storage(format!("Failed to query grants: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(grants)
    }

    /// Total number of stored grants across all apps
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM persisted_grants", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Failed to count grants: {}", e)))?;

        Ok(count as usize)
    }

    fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersistedGrant> {
        Ok(PersistedGrant {
            app_id: row.get(0)?,
            path: row.get(1)?,
            mode: row.get(2)?,
            granting_app: row.get(3)?,
            active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            activated_at: row.get(7)?,
        })
    }
}
