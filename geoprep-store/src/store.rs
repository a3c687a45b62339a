//! Embedded analytical store (C1). A small pool of independent DuckDB
//! connections, selected round-robin, in front of which C2/C3 do one-shot
//! ingestion and C5/C11 run read queries.

use crate::error::StoreError;
use duckdb::{Connection, Row};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct Store {
    handles: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl Store {
    /// Opens `pool_size` independent connections to the file at `path`,
    /// applies the memory cap and insertion-order preference, and loads the
    /// spatial extension. Fails fatally (returns `Err`) if the extension
    /// cannot be loaded — the spec requires no degraded-but-running mode
    /// here, since every downstream component assumes spatial functions
    /// exist.
    pub fn initialize(
        path: &str,
        pool_size: usize,
        memory_limit: &str,
        preserve_insertion_order: bool,
        load_spatial_extension: bool,
    ) -> Result<Self, StoreError> {
        let pool_size = pool_size.max(1);
        let mut handles = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open(Path::new(path)).map_err(|e| StoreError::Init {
                path: path.to_string(),
                source: e,
            })?;
            conn.execute_batch(&format!(
                "SET memory_limit='{memory_limit}'; SET preserve_insertion_order={};",
                preserve_insertion_order
            ))
            .map_err(StoreError::Query)?;
            if load_spatial_extension {
                conn.execute_batch("INSTALL spatial; LOAD spatial;")
                    .map_err(StoreError::SpatialExtension)?;
            }
            handles.push(Mutex::new(conn));
        }
        log::info!("analytical store ready at {path} with {pool_size} connection(s)");
        Ok(Self {
            handles,
            next: AtomicUsize::new(0),
        })
    }

    fn next_handle(&self) -> &Mutex<Connection> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        &self.handles[idx]
    }

    /// Runs `sql` against the next handle in round-robin order, mapping each
    /// returned row with `map_row`. A SQL failure here never tears down the
    /// pool — only this call's result is an `Err`.
    pub fn query<T>(
        &self,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
        mut map_row: impl FnMut(&Row) -> duckdb::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let handle = self.next_handle();
        let conn = handle.lock().expect("store connection mutex poisoned");
        let mut stmt = conn.prepare(sql).map_err(StoreError::Query)?;
        let rows = stmt
            .query_map(params, |row| map_row(row))
            .map_err(StoreError::Query)?;
        rows.collect::<duckdb::Result<Vec<T>>>()
            .map_err(StoreError::Query)
    }

    /// Runs a statement with no result rows (DDL, `INSERT`, `UPDATE`, ...)
    /// against the next handle in round-robin order.
    pub fn execute(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<usize, StoreError> {
        let handle = self.next_handle();
        let conn = handle.lock().expect("store connection mutex poisoned");
        conn.execute(sql, params).map_err(StoreError::Query)
    }

    /// Runs a batch of statements (no parameters) against the next handle.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let handle = self.next_handle();
        let conn = handle.lock().expect("store connection mutex poisoned");
        conn.execute_batch(sql).map_err(StoreError::Query)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let rows = self.query(
            "SELECT table_name FROM information_schema.tables WHERE table_name = ?",
            &[&table],
            |row| row.get::<usize, String>(0),
        )?;
        Ok(!rows.is_empty())
    }

    pub fn close(self) {
        log::info!("closing analytical store");
        drop(self);
    }
}
