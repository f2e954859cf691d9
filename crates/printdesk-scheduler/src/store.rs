// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent scheduler state backed by SQLite.
//
// Holds everything needed to rebuild the scheduler after a restart: printer
// records and their registration order, the discarded set, the job history
// map and the all-time / per-day metrics. Structured values are stored as
// JSON columns. Queues are not persisted; see
// `LifecycleTracker::recover_interrupted`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use printdesk_core::error::{PrintdeskError, Result};

use crate::capabilities::{PrinterRecord, PrinterSet};
use crate::lifecycle::{HistoryEntry, MetricsTotals};

/// SQLite schema for all state tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        name TEXT PRIMARY KEY,
        position INTEGER NOT NULL,
        record TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS discarded_printers (
        name TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS job_history (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        processed_at TEXT NOT NULL,
        entry TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS metrics_total (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        totals TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS metrics_daily (
        day TEXT PRIMARY KEY,
        totals TEXT NOT NULL
    );
"#;

fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> PrintdeskError + '_ {
    move |e| PrintdeskError::Database(format!("{context}: {e}"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(column: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// SQLite-backed state. All methods are synchronous and short.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (or create) the state database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;

        info!("state database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;

        debug!("in-memory state database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PrintdeskError::Database("state connection lock poisoned".into()))
    }

    // -- Printers -----------------------------------------------------------

    /// Replace the stored printer set.
    pub fn save_printers(&self, set: &PrinterSet) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin"))?;

        tx.execute("DELETE FROM printers", [])
            .map_err(db_err("clear printers"))?;
        for (position, printer) in set.printers().iter().enumerate() {
            tx.execute(
                "INSERT INTO printers (name, position, record) VALUES (?1, ?2, ?3)",
                params![printer.name, position as i64, to_json(printer)?],
            )
            .map_err(db_err("insert printer"))?;
        }

        tx.execute("DELETE FROM discarded_printers", [])
            .map_err(db_err("clear discarded"))?;
        for name in set.discarded() {
            tx.execute(
                "INSERT INTO discarded_printers (name) VALUES (?1)",
                params![name],
            )
            .map_err(db_err("insert discarded"))?;
        }

        tx.commit().map_err(db_err("commit printers"))?;
        debug!(printers = set.len(), "printer set saved");
        Ok(())
    }

    pub fn load_printers(&self) -> Result<PrinterSet> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT record FROM printers ORDER BY position ASC")
            .map_err(db_err("prepare load printers"))?;
        let printers = stmt
            .query_map([], |row| from_json::<PrinterRecord>(0, &row.get::<_, String>(0)?))
            .map_err(db_err("query printers"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect printers"))?;

        let mut stmt = conn
            .prepare("SELECT name FROM discarded_printers")
            .map_err(db_err("prepare load discarded"))?;
        let discarded = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err("query discarded"))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()
            .map_err(db_err("collect discarded"))?;

        Ok(PrinterSet::new(printers, discarded))
    }

    // -- History ------------------------------------------------------------

    /// Insert or replace the history entry for a job.
    pub fn save_history_entry(&self, entry: &HistoryEntry) -> Result<()> {
        let json = to_json(entry)?;
        self.conn()?
            .execute(
                "INSERT INTO job_history (id, status, processed_at, entry)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    processed_at = excluded.processed_at,
                    entry = excluded.entry",
                params![
                    entry.job.id.as_str(),
                    entry.status.to_string(),
                    entry.processed_at.to_rfc3339(),
                    json
                ],
            )
            .map_err(db_err("save history entry"))?;
        Ok(())
    }

    pub fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT entry FROM job_history ORDER BY processed_at ASC")
            .map_err(db_err("prepare load history"))?;
        let entries = stmt
            .query_map([], |row| from_json::<HistoryEntry>(0, &row.get::<_, String>(0)?))
            .map_err(db_err("query history"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect history"))?;
        Ok(entries)
    }

    // -- Metrics ------------------------------------------------------------

    /// Store the all-time totals and one day's bucket atomically.
    pub fn save_metrics(&self, totals: &MetricsTotals, day: &str, daily: &MetricsTotals) -> Result<()> {
        let totals_json = to_json(totals)?;
        let daily_json = to_json(daily)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin"))?;
        tx.execute(
            "INSERT INTO metrics_total (id, totals) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET totals = excluded.totals",
            params![totals_json],
        )
        .map_err(db_err("save totals"))?;
        tx.execute(
            "INSERT INTO metrics_daily (day, totals) VALUES (?1, ?2)
             ON CONFLICT(day) DO UPDATE SET totals = excluded.totals",
            params![day, daily_json],
        )
        .map_err(db_err("save daily metrics"))?;
        tx.commit().map_err(db_err("commit metrics"))?;
        Ok(())
    }

    pub fn load_metrics(&self) -> Result<(MetricsTotals, BTreeMap<String, MetricsTotals>)> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT totals FROM metrics_total WHERE id = 1")
            .map_err(db_err("prepare load totals"))?;
        let mut rows = stmt
            .query_map([], |row| from_json::<MetricsTotals>(0, &row.get::<_, String>(0)?))
            .map_err(db_err("query totals"))?;
        let totals = match rows.next() {
            Some(row) => row.map_err(db_err("totals row"))?,
            None => MetricsTotals::default(),
        };
        drop(rows);

        let mut stmt = conn
            .prepare("SELECT day, totals FROM metrics_daily")
            .map_err(db_err("prepare load daily"))?;
        let daily = stmt
            .query_map([], |row| {
                let day: String = row.get(0)?;
                let totals = from_json::<MetricsTotals>(1, &row.get::<_, String>(1)?)?;
                Ok((day, totals))
            })
            .map_err(db_err("query daily"))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()
            .map_err(db_err("collect daily"))?;

        Ok((totals, daily))
    }
}
