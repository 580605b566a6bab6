//! Audit log — SQLite-based operation history.
//!
//! Stores one row per vault operation (add, update, delete, export,
//! reset, ...) in a local SQLite database at `<vault_dir>/audit.db`.
//! Rows carry the account and record id, never record content.
//!
//! If the database can't be opened or written to, operations continue
//! without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{Result, TierVaultError};

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub account: String,
    pub record_id: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<vault_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened; callers treat
    /// that as "audit logging unavailable".
    pub fn open(vault_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(vault_dir);
        let conn = Connection::open(&db_path).ok()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                account     TEXT NOT NULL,
                record_id   TEXT,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation.  Errors are ignored.
    pub fn log(
        &self,
        operation: &str,
        account: &str,
        record_id: Option<&str>,
        details: Option<&str>,
    ) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, account, record_id, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, account, record_id, details],
        );
    }

    /// Most recent entries first, at most `limit`, optionally only those
    /// at or after `since`.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // RFC 3339 strings in UTC sort chronologically, so the epoch is a
        // safe lower bound when no filter is given.
        let since = since
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, account, record_id, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| TierVaultError::Audit(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit], |row| {
                let ts: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    account: row.get(3)?,
                    record_id: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| TierVaultError::Audit(format!("query exec: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TierVaultError::Audit(format!("row parse: {e}")))
    }

    pub fn db_path(vault_dir: &Path) -> PathBuf {
        vault_dir.join("audit.db")
    }
}
