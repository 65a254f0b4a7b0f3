use crate::model::{ResolutionKind, StorageError};
use crate::resolver::RunSummary;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

/// One stored run, as read back for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub failed: usize,
    pub close_calls: usize,
    pub ai_calls: usize,
}

impl RunRecord {
    pub fn coverage(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => (total - self.failed) as f64 / total as f64,
        }
    }
}

/// A `(brand, model)` pair that no stage could resolve, across all runs.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedEntry {
    pub brand: String,
    pub model: String,
    pub occurrences: i64,
    pub last_seen: DateTime<Utc>,
}

/// Run history: per-run outcome counts and the unresolved pairs operators should curate.
pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    /// Opens the database and creates missing tables and columns.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                total INTEGER NOT NULL,
                cache INTEGER NOT NULL DEFAULT 0,
                substitution INTEGER NOT NULL DEFAULT 0,
                exact INTEGER NOT NULL DEFAULT 0,
                fuzzy INTEGER NOT NULL DEFAULT 0,
                partial INTEGER NOT NULL DEFAULT 0,
                wide INTEGER NOT NULL DEFAULT 0,
                ai INTEGER NOT NULL DEFAULT 0,
                fail INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS unresolved (
                brand TEXT NOT NULL,
                model TEXT NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 1,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                PRIMARY KEY (brand, model)
            );
            ",
        )?;

        // Diagnostics columns arrived after the first schema.
        Self::migrate_add_column_if_missing(&conn, "runs", "close_calls", "INTEGER NOT NULL DEFAULT 0")?;
        Self::migrate_add_column_if_missing(&conn, "runs", "ai_calls", "INTEGER NOT NULL DEFAULT 0")?;

        Ok(Self { conn })
    }

    /// Adds `column` to `table` unless an older history file already has it.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    /// Stores a finished run and returns its id.
    pub fn save_run(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        summary: &RunSummary,
    ) -> Result<i64, StorageError> {
        let count = |kind: ResolutionKind| summary.count(kind) as i64;
        self.conn.execute(
            "INSERT INTO runs (
                started_at, finished_at, total,
                cache, substitution, exact, fuzzy, partial, wide, ai, fail,
                close_calls, ai_calls
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                started_at.to_rfc3339(),
                finished_at.to_rfc3339(),
                summary.total() as i64,
                count(ResolutionKind::Cache),
                count(ResolutionKind::Substitution),
                count(ResolutionKind::Exact),
                count(ResolutionKind::Fuzzy),
                count(ResolutionKind::Partial),
                count(ResolutionKind::Wide),
                count(ResolutionKind::Ai),
                count(ResolutionKind::Fail),
                summary.close_calls as i64,
                summary.ai_calls as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Counts one more occurrence of an unresolved pair.
    pub fn record_unresolved(&self, brand: &str, model: &str, seen_at: DateTime<Utc>) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO unresolved (brand, model, occurrences, first_seen, last_seen)
             VALUES (?1, ?2, 1, ?3, ?3)
             ON CONFLICT (brand, model) DO UPDATE SET
                occurrences = occurrences + 1,
                last_seen = excluded.last_seen",
            params![brand, model, seen_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most frequent unresolved pairs first.
    pub fn top_unresolved(&self, limit: usize) -> Result<Vec<UnresolvedEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT brand, model, occurrences, last_seen FROM unresolved
             ORDER BY occurrences DESC, last_seen DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(UnresolvedEntry {
                brand: row.get(0)?,
                model: row.get(1)?,
                occurrences: row.get(2)?,
                last_seen: Self::timestamp(row, 3)?,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Latest runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, total, fail, close_calls, ai_calls
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                started_at: Self::timestamp(row, 1)?,
                finished_at: Self::timestamp(row, 2)?,
                total: Self::count(row, 3)?,
                failed: Self::count(row, 4)?,
                close_calls: Self::count(row, 5)?,
                ai_calls: Self::count(row, 6)?,
            })
        })?;

        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    fn timestamp(row: &Row, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
        let raw: String = row.get(index)?;
        raw.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn count(row: &Row, index: usize) -> Result<usize, rusqlite::Error> {
        let raw: i64 = row.get(index)?;
        usize::try_from(raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Integer, Box::new(e))
        })
    }
}
