//! `geoprep stats`: row counts for the analytical store's tables, a small
//! operator-facing supplement beyond the four P1-P4 phases.

use crate::error::PipelineError;
use geoprep_store::{registry, stops, Store};

pub fn run(store: &Store) -> Result<(), PipelineError> {
    println!("sirene: {} row(s)", count(store, registry::TABLE)?);
    println!("transport_stops: {} row(s)", count(store, stops::TABLE)?);
    Ok(())
}

fn count(store: &Store, table: &str) -> Result<i64, PipelineError> {
    let rows = store.query(&format!("SELECT COUNT(*) FROM {table}"), &[], |row| {
        row.get::<usize, i64>(0)
    })?;
    Ok(rows.into_iter().next().unwrap_or(0))
}
