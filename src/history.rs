use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::models::TestResult;

/// History storage error types
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only store of finished test results
pub trait HistoryStore {
    /// Append one test's results, keeping their order
    fn append(&mut self, session_id: Uuid, results: &[TestResult]) -> Result<(), HistoryError>;

    /// All stored results, oldest first
    fn list(&self) -> Result<Vec<TestResult>, HistoryError>;

    /// Remove every stored result
    fn clear(&mut self) -> Result<(), HistoryError>;
}

/// Filters applied on top of [`HistoryStore::list`]
#[derive(Debug, Default, Clone)]
pub struct HistoryFilters {
    /// Case-insensitive athlete name
    pub athlete: Option<String>,
    /// Keep only the most recent `limit` results
    pub limit: Option<usize>,
}

impl HistoryFilters {
    /// Newest-first view of `results` matching the filters
    pub fn apply(&self, results: Vec<TestResult>) -> Vec<TestResult> {
        let athlete = self.athlete.as_ref().map(|a| a.trim().to_lowercase());

        let filtered = results
            .into_iter()
            .rev()
            .filter(|r| athlete.as_ref().map_or(true, |a| r.name.to_lowercase() == *a));

        match self.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}

/// SQLite-backed result history
pub struct SqliteHistory {
    conn: Connection,
}

impl SqliteHistory {
    /// Create or open a history database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        let history = Self { conn };
        history.init_schema()?;
        Ok(history)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Result<Self, HistoryError> {
        let history = Self {
            conn: Connection::open_in_memory()?,
        };
        history.init_schema()?;
        Ok(history)
    }

    fn init_schema(&self) -> Result<(), HistoryError> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS test_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                distance INTEGER NOT NULL,
                level TEXT NOT NULL,
                vo2max REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_test_results_name ON test_results (name COLLATE NOCASE)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_test_results_session ON test_results (session_id)",
            [],
        )?;

        Ok(())
    }

    /// Number of distinct test sessions stored
    pub fn session_count(&self) -> Result<usize, HistoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT session_id) FROM test_results",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn result_from_row(row: &Row) -> rusqlite::Result<TestResult> {
        Ok(TestResult {
            name: row.get("name")?,
            distance: row.get("distance")?,
            level: row.get("level")?,
            vo2max: row.get("vo2max")?,
            date: row.get::<_, DateTime<Utc>>("recorded_at")?,
        })
    }
}

impl HistoryStore for SqliteHistory {
    fn append(&mut self, session_id: Uuid, results: &[TestResult]) -> Result<(), HistoryError> {
        let tx = self.conn.transaction()?;

        for (position, result) in results.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO test_results (
                    session_id, position, name, distance, level, vo2max, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    session_id.to_string(),
                    position as i64,
                    result.name,
                    result.distance,
                    result.level,
                    result.vo2max,
                    result.date,
                ],
            )?;
        }

        tx.commit()?;
        tracing::info!(session = %session_id, count = results.len(), "Results appended to history");
        Ok(())
    }

    fn list(&self) -> Result<Vec<TestResult>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, distance, level, vo2max, recorded_at FROM test_results ORDER BY id ASC",
        )?;
        let results = stmt
            .query_map([], Self::result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        let removed = self.conn.execute("DELETE FROM test_results", [])?;
        tracing::info!(removed, "History cleared");
        Ok(())
    }
}

/// Volatile history kept in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    results: Vec<TestResult>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&mut self, _session_id: Uuid, results: &[TestResult]) -> Result<(), HistoryError> {
        self.results.extend_from_slice(results);
        Ok(())
    }

    fn list(&self) -> Result<Vec<TestResult>, HistoryError> {
        Ok(self.results.clone())
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        self.results.clear();
        Ok(())
    }
}

/// Import a JSON array of results, as saved by the browser version of the test.
///
/// The whole file is stored as one session. Returns how many results were added.
pub fn import_legacy_json<P, H>(path: P, store: &mut H) -> Result<usize, HistoryError>
where
    P: AsRef<Path>,
    H: HistoryStore + ?Sized,
{
    let content = fs::read_to_string(&path)?;
    let results: Vec<TestResult> = serde_json::from_str(&content)?;

    store.append(Uuid::new_v4(), &results)?;
    tracing::info!(
        file = %path.as_ref().display(),
        count = results.len(),
        "Legacy history imported"
    );
    Ok(results.len())
}
