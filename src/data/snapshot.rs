use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::Mutex;
use tracing::info;
use crate::data::types::{format_timestamp, parse_timestamp, Observation, TimeWindow};
use crate::data::window::validate_table_name;
use crate::data::LoadSource;
use crate::error::{ForecastError, ForecastResult};

/// Local SQLite copy of `total_load_data`, for offline runs.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SnapshotStore {
    pub fn new(db_path: &str, table: &str) -> ForecastResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, table)
    }

    #[cfg(test)]
    pub fn in_memory(table: &str) -> ForecastResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> ForecastResult<Self> {
        validate_table_name(table)?;
        // SQLite has no schemas here, keep only the bare name
        let table = table.rsplit('.').next().unwrap_or(table).to_string();

        // Timestamps as fixed-width text sort the same as instants
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                timestamp TEXT PRIMARY KEY,
                total_load REAL NOT NULL
            );
            "#
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }

    fn lock(&self) -> ForecastResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ForecastError::DataSource("snapshot connection poisoned".to_string()))
    }

    /// Upsert rows; returns how many were written.
    pub fn insert_observations(&self, rows: &[Observation]) -> ForecastResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (timestamp, total_load) VALUES (?1, ?2)",
                self.table
            ))?;
            for row in rows {
                stmt.execute(params![format_timestamp(&row.timestamp), row.total_load])?;
            }
        }
        tx.commit()?;

        info!("Stored {} rows in snapshot table {}", rows.len(), self.table);
        Ok(rows.len())
    }

    pub fn count(&self) -> ForecastResult<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn select(&self, window: &TimeWindow) -> ForecastResult<Vec<Observation>> {
        let conn = self.lock()?;
        let start = format_timestamp(&window.start);

        let raw: Vec<(String, f64)> = match window.end {
            Some(end) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT timestamp, total_load FROM {}
                     WHERE timestamp >= ?1 AND timestamp < ?2
                     ORDER BY timestamp ASC",
                    self.table
                ))?;
                let rows = stmt.query_map(params![start, format_timestamp(&end)], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT timestamp, total_load FROM {}
                     WHERE timestamp >= ?1
                     ORDER BY timestamp ASC",
                    self.table
                ))?;
                let rows = stmt.query_map(params![start], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        raw.into_iter()
            .map(|(ts, total_load)| {
                let timestamp = parse_timestamp(&ts).map_err(|e| {
                    ForecastError::DataSource(format!("Bad timestamp in snapshot: {} ({})", ts, e))
                })?;
                Ok(Observation { timestamp, total_load })
            })
            .collect()
    }
}

#[async_trait]
impl LoadSource for SnapshotStore {
    async fn query(&self, window: &TimeWindow) -> ForecastResult<Vec<Observation>> {
        let rows = self.select(window)?;
        info!("Loaded {} rows from snapshot table {}", rows.len(), self.table);
        Ok(rows)
    }
}
