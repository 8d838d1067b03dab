//! Persistence of runs between process lifetimes.

use crate::error::StorageError;
use crate::run::Run;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::debug;

/// Where runs are read at start and written at the end.
pub trait RunStorage: Send + Sync {
    fn read(&self, run_id: &str) -> Result<Option<Run>, StorageError>;

    fn upsert(&self, run: &Run) -> Result<(), StorageError>;

    /// Run ids, newest first, optionally restricted to one user.
    fn get_all_run_ids(&self, user_id: Option<&str>) -> Result<Vec<String>, StorageError>;

    fn delete(&self, run_id: &str) -> Result<(), StorageError>;
}

/// SQLite-backed run storage: one row per run, message history as JSON.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    table: String,
}

fn valid_table_name(table: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(table))
}

impl SqliteStorage {
    pub fn open(db_file: impl AsRef<Path>, table: &str) -> Result<Self, StorageError> {
        let db_file = db_file.as_ref();
        if let Some(parent) = db_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_file)?, table)
    }

    pub fn in_memory(table: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, table)
    }

    fn init(conn: Connection, table: &str) -> Result<Self, StorageError> {
        if !valid_table_name(table) {
            return Err(StorageError::InvalidTableName(table.to_string()));
        }
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                run_id TEXT PRIMARY KEY,
                user_id TEXT,
                name TEXT,
                llm TEXT,
                messages TEXT NOT NULL,
                metrics TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id);
            "#
        ))?;
        debug!(table, "Run storage ready");
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

struct RunRow {
    run_id: String,
    user_id: Option<String>,
    name: Option<String>,
    llm: Option<String>,
    messages: String,
    metrics: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RunRow {
    fn into_run(self) -> Result<Run, StorageError> {
        Ok(Run {
            run_id: self.run_id,
            user_id: self.user_id,
            name: self.name,
            llm: self.llm.as_deref().map(serde_json::from_str).transpose()?,
            messages: serde_json::from_str(&self.messages)?,
            metrics: serde_json::from_str(&self.metrics)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RunStorage for SqliteStorage {
    fn read(&self, run_id: &str) -> Result<Option<Run>, StorageError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT run_id, user_id, name, llm, messages, metrics, created_at, updated_at \
                     FROM {} WHERE run_id = ?1",
                    self.table
                ),
                params![run_id],
                |row| {
                    Ok(RunRow {
                        run_id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        llm: row.get(3)?,
                        messages: row.get(4)?,
                        metrics: row.get(5)?,
                        created_at: parse_timestamp(&row.get::<_, String>(6)?)?,
                        updated_at: parse_timestamp(&row.get::<_, String>(7)?)?,
                    })
                },
            )
            .optional()?;
        row.map(RunRow::into_run).transpose()
    }

    fn upsert(&self, run: &Run) -> Result<(), StorageError> {
        let llm = run.llm.as_ref().map(serde_json::to_string).transpose()?;
        let messages = serde_json::to_string(&run.messages)?;
        let metrics = serde_json::to_string(&run.metrics)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (run_id, user_id, name, llm, messages, metrics, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(run_id) DO UPDATE SET \
                 user_id = excluded.user_id, name = excluded.name, llm = excluded.llm, \
                 messages = excluded.messages, metrics = excluded.metrics, updated_at = excluded.updated_at",
                self.table
            ),
            params![
                run.run_id,
                run.user_id,
                run.name,
                llm,
                messages,
                metrics,
                timestamp(&run.created_at),
                timestamp(&run.updated_at),
            ],
        )?;
        debug!(run_id = %run.run_id, messages = run.messages.len(), "Run stored");
        Ok(())
    }

    fn get_all_run_ids(&self, user_id: Option<&str>) -> Result<Vec<String>, StorageError> {
        let conn = self.conn()?;
        let ids = match user_id {
            Some(user) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT run_id FROM {} WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
                    self.table
                ))?;
                let rows = stmt.query_map(params![user], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT run_id FROM {} ORDER BY created_at DESC, rowid DESC",
                    self.table
                ))?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(ids)
    }

    fn delete(&self, run_id: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(&format!("DELETE FROM {} WHERE run_id = ?1", self.table), params![run_id])?;
        Ok(())
    }
}
