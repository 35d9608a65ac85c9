use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use tracetree_core::error::{Result, TraceTreeError};

use crate::schema::SCHEMA_SQL;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub spans_count: usize,
    pub traces_count: usize,
    pub oldest_span: Option<DateTime<Utc>>,
    pub newest_span: Option<DateTime<Utc>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| TraceTreeError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TraceTreeError::Store(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch("PRAGMA threads=4;")
            .map_err(|e| TraceTreeError::Store(format!("failed to set pragmas: {e}")))?;
        Self::init(conn, path.display().to_string())
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TraceTreeError::Store(format!("failed to open in-memory db: {e}")))?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, db_path: String) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TraceTreeError::Store(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TraceTreeError::Internal("store mutex poisoned".to_string()))
    }

    pub fn status(&self) -> Result<StoreStatus> {
        let conn = self.conn()?;

        let spans_count = scalar_usize(&conn, "SELECT COUNT(*) FROM spans")?;
        let traces_count = scalar_usize(&conn, "SELECT COUNT(*) FROM traces")?;
        let oldest_span = scalar_ts(&conn, "SELECT MIN(start_time) FROM spans")?;
        let newest_span = scalar_ts(&conn, "SELECT MAX(start_time) FROM spans")?;

        let db_size_bytes = if self.db_path == ":memory:" {
            0
        } else {
            fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStatus {
            db_path: self.db_path.clone(),
            db_size_bytes,
            spans_count,
            traces_count,
            oldest_span,
            newest_span,
        })
    }
}

fn scalar_usize(conn: &Connection, sql: &str) -> Result<usize> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|v| v as usize)
        .map_err(|e| TraceTreeError::Store(format!("query failed: {e}")))
}

fn scalar_ts(conn: &Connection, sql: &str) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(sql, [], |row| row.get::<_, Option<NaiveDateTime>>(0))
        .map(|opt| opt.map(|dt| dt.and_utc()))
        .map_err(|e| TraceTreeError::Store(format!("query failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_initializes() {
        let store = Store::open_in_memory().unwrap();
        let status = store.status().unwrap();
        assert_eq!(status.spans_count, 0);
        assert_eq!(status.traces_count, 0);
        assert_eq!(status.db_size_bytes, 0);
        assert!(status.oldest_span.is_none());
    }
}
