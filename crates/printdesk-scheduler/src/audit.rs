// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print audit trail — append-only SQLite log of every job outcome.
//
// Schema:
//   print_audit(
//     id            INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp     TEXT    NOT NULL,   -- RFC 3339
//     action        TEXT    NOT NULL,   -- print_completed, print_failed, retry_*
//     job_id        TEXT    NOT NULL,
//     printer       TEXT,
//     document_hash TEXT,               -- SHA-256 hex digest, once fetched
//     success       INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details       TEXT                -- optional free-form context
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use printdesk_core::error::PrintdeskError;

use crate::queue::Attempt;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS print_audit (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp     TEXT    NOT NULL,
    action        TEXT    NOT NULL,
    job_id        TEXT    NOT NULL,
    printer       TEXT,
    document_hash TEXT,
    success       INTEGER NOT NULL,
    details       TEXT
);";

/// Convert a `rusqlite::Error` into a `PrintdeskError::Database`.
fn db_err(e: rusqlite::Error) -> PrintdeskError {
    PrintdeskError::Database(e.to_string())
}

/// SHA-256 hex digest of a document, used to fingerprint what was printed.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Kind of outcome being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    PrintCompleted,
    PrintFailed,
    RetryCompleted,
    RetryFailed,
}

impl AuditAction {
    pub fn for_outcome(attempt: Attempt, success: bool) -> Self {
        match (attempt, success) {
            (Attempt::Original, true) => Self::PrintCompleted,
            (Attempt::Original, false) => Self::PrintFailed,
            (Attempt::Retry, true) => Self::RetryCompleted,
            (Attempt::Retry, false) => Self::RetryFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrintCompleted => "print_completed",
            Self::PrintFailed => "print_failed",
            Self::RetryCompleted => "retry_completed",
            Self::RetryFailed => "retry_failed",
        }
    }
}

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub job_id: String,
    pub printer: Option<String>,
    pub document_hash: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PrintdeskError> {
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL for concurrent readers.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self, PrintdeskError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PrintdeskError> {
        self.conn
            .lock()
            .map_err(|_| PrintdeskError::Database("audit connection lock poisoned".into()))
    }

    /// Record a job outcome.
    #[instrument(skip(self, details), fields(action = action.as_str(), %job_id))]
    pub fn record(
        &self,
        action: AuditAction,
        job_id: &str,
        printer: Option<&str>,
        document_hash: Option<&str>,
        details: Option<&str>,
    ) -> Result<(), PrintdeskError> {
        let timestamp = Utc::now().to_rfc3339();
        let success = matches!(action, AuditAction::PrintCompleted | AuditAction::RetryCompleted);
        let success_int: i32 = if success { 1 } else { 0 };

        self.conn()?
            .execute(
                "INSERT INTO print_audit (timestamp, action, job_id, printer, document_hash, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    timestamp,
                    action.as_str(),
                    job_id,
                    printer,
                    document_hash,
                    success_int,
                    details
                ],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for a job, oldest first.
    pub fn entries_for_job(&self, job_id: &str) -> Result<Vec<AuditEntry>, PrintdeskError> {
        self.query(
            "SELECT id, timestamp, action, job_id, printer, document_hash, success, details
             FROM print_audit
             WHERE job_id = ?1
             ORDER BY id ASC",
            params![job_id],
        )
    }

    /// Retrieve the most recent `limit` entries, ordered newest-first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, PrintdeskError> {
        self.query(
            "SELECT id, timestamp, action, job_id, printer, document_hash, success, details
             FROM print_audit
             ORDER BY id DESC
             LIMIT ?1",
            params![limit],
        )
    }

    fn query(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<AuditEntry>, PrintdeskError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    action: row.get(2)?,
                    job_id: row.get(3)?,
                    printer: row.get(4)?,
                    document_hash: row.get(5)?,
                    success: row.get::<_, i32>(6)? != 0,
                    details: row.get(7)?,
                })
            })
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    #[cfg(test)]
    fn count(&self) -> Result<u64, PrintdeskError> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM print_audit", [], |row| row.get(0))
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log() -> AuditLog {
        AuditLog::open_in_memory().expect("open in-memory audit log")
    }

    #[test]
    fn record_and_count() {
        let log = make_log();
        assert_eq!(log.count().expect("count"), 0);

        log.record(AuditAction::PrintCompleted, "j1", Some("P1"), Some("abc"), None)
            .expect("record");
        log.record(AuditAction::PrintFailed, "j2", None, None, Some("No suitable printer available"))
            .expect("record");

        assert_eq!(log.count().expect("count"), 2);
    }

    #[test]
    fn entries_for_job() {
        let log = make_log();
        log.record(AuditAction::PrintFailed, "j1", Some("P1"), None, Some("fetch failed"))
            .expect("record");
        log.record(AuditAction::PrintCompleted, "j2", Some("P1"), Some("bbb"), None)
            .expect("record");
        log.record(AuditAction::RetryCompleted, "j1", Some("P2"), Some("aaa"), None)
            .expect("record");

        let entries = log.entries_for_job("j1").expect("query");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "print_failed");
        assert!(!entries[0].success);
        assert_eq!(entries[0].details.as_deref(), Some("fetch failed"));
        assert_eq!(entries[1].action, "retry_completed");
        assert!(entries[1].success);
        assert_eq!(entries[1].printer.as_deref(), Some("P2"));
    }

    #[test]
    fn recent_entries_ordering() {
        let log = make_log();
        for i in 0..5 {
            log.record(AuditAction::PrintCompleted, &format!("job_{i}"), None, None, None)
                .expect("record");
        }

        let recent = log.recent_entries(3).expect("query");
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id);
        assert!(recent[1].id > recent[2].id);
    }

    #[test]
    fn action_for_outcome() {
        assert_eq!(
            AuditAction::for_outcome(Attempt::Retry, false).as_str(),
            "retry_failed"
        );
        assert_eq!(
            AuditAction::for_outcome(Attempt::Original, true),
            AuditAction::PrintCompleted
        );
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
