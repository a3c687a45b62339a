//! Stops loader (C3): one-shot, idempotent ingestion of the transport-stop
//! CSV export into the analytical store, with a composite spatial index.

use crate::error::StoreError;
use crate::store::Store;
use duckdb::Row;
use geoprep_core::domain::Stop;
use std::path::Path;

pub const TABLE: &str = "transport_stops";

pub mod columns {
    pub const STOP_ID: &str = "stop_id";
    pub const STOP_NAME: &str = "stop_name";
    pub const STOP_LAT: &str = "stop_lat";
    pub const STOP_LON: &str = "stop_lon";
    pub const LOCATION_TYPE: &str = "location_type";
    pub const DATASET_ID: &str = "dataset_id";
    pub const RESOURCE_ID: &str = "resource_id";
    pub const DATASET_DATAGOUV_ID: &str = "dataset_datagouv_id";
    pub const RESOURCE_DATAGOUV_ID: &str = "resource_datagouv_id";
    pub const DATASET_CUSTOM_TITLE: &str = "dataset_custom_title";
}

pub const SELECT_COLUMNS: &str = "stop_id, stop_name, stop_lat, stop_lon, location_type, \
    dataset_id, resource_id, dataset_datagouv_id, resource_datagouv_id, dataset_custom_title";

pub fn map_row(row: &Row) -> duckdb::Result<Stop> {
    Ok(Stop {
        stop_id: row.get(0)?,
        stop_name: row.get(1)?,
        lat: row.get(2)?,
        lon: row.get(3)?,
        location_type: row.get(4)?,
        dataset_id: row.get(5)?,
        resource_id: row.get(6)?,
        dataset_datagouv_id: row.get(7)?,
        resource_datagouv_id: row.get(8)?,
        dataset_custom_title: row.get(9)?,
    })
}

/// Ensures the `transport_stops` table and its composite lat/lon index
/// exist, ingesting from `source_path` only when the table is missing
/// (idempotent, per spec §4.3). Fails fatally if the table is missing and
/// the source file does not exist.
pub fn ensure_loaded(store: &Store, source_path: &str) -> Result<(), StoreError> {
    if store.table_exists(TABLE)? {
        log::info!("stops table '{TABLE}' already present, skipping ingest");
    } else {
        if !Path::new(source_path).exists() {
            return Err(StoreError::MissingSource(source_path.to_string()));
        }
        log::info!("ingesting transport stops from {source_path}");
        store.execute_batch(&format!(
            "CREATE TABLE {TABLE} AS SELECT * FROM read_csv_auto('{source_path}');"
        ))?;
    }
    store.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS idx_transport_stops_latlon ON {TABLE}({}, {});",
        columns::STOP_LAT,
        columns::STOP_LON,
    ))
}

/// Loads every stop row into memory, for `geoprep_core::stop_grid::StopGrid`
/// and `geoprep_core::geo_utils::NearestIndex` to index (C6, C13).
pub fn load_all(store: &Store) -> Result<Vec<Stop>, StoreError> {
    store.query(&format!("SELECT {SELECT_COLUMNS} FROM {TABLE}"), &[], map_row)
}
