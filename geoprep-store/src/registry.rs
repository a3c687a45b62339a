//! Registry loader (C2): one-shot, idempotent ingestion of the company
//! registry columnar file plus the secondary indexes the identity resolver
//! (C5, in `geoprep-offers`) relies on.

use crate::error::StoreError;
use crate::store::Store;
use duckdb::Row;
use geoprep_core::domain::RegistryRow;
use std::path::Path;

pub const TABLE: &str = "sirene";

/// Column names of the `sirene` table. The spec only pins down the business
/// semantics (§3, §4.2, §4.5) and leaves the exact source schema
/// implementer-defined beyond the fields called out there; these names
/// follow the usual INSEE SIRENE stock file conventions.
pub mod columns {
    pub const SIRET: &str = "siret";
    pub const SIREN: &str = "siren";
    pub const NIC: &str = "nic";
    pub const STATUS: &str = "etatadministratifetablissement";
    pub const LEGAL_NAME: &str = "denominationunitelegale";
    pub const USUAL_NAME: &str = "denominationusuelleetablissement";
    pub const SIGN_NAME: &str = "enseigne1etablissement";
    pub const POSTAL_CODE: &str = "codepostaletablissement";
    pub const COMMUNE_LABEL: &str = "libellecommuneetablissement";
    pub const SIZE_TRANCHE: &str = "trancheeffectifsetablissement";
    pub const NAF_CODE: &str = "activiteprincipaleetablissement";
    pub const SECTOR_SECTION: &str = "sectionetablissement";
    pub const LEGAL_CATEGORY: &str = "categoriejuridiqueunitelegale";
    pub const GEOM: &str = "geolocetablissement";
    pub const IS_HEAD_OFFICE: &str = "etablissementsiege";
    pub const LAT_CACHED: &str = "lat_cached";
    pub const LON_CACHED: &str = "lon_cached";
}

/// Column list (and order) used by every `SELECT` against `sirene`, shared
/// with `geoprep-offers`'s cascade queries so row-mapping stays in one place.
pub const SELECT_COLUMNS: &str = "siret, siren, etatadministratifetablissement, \
    denominationunitelegale, denominationusuelleetablissement, enseigne1etablissement, \
    codepostaletablissement, libellecommuneetablissement, trancheeffectifsetablissement, \
    activiteprincipaleetablissement, sectionetablissement, categoriejuridiqueunitelegale, \
    lat_cached, lon_cached";

/// Maps one row produced by a `SELECT {SELECT_COLUMNS} FROM sirene ...` query
/// into the domain type. Ordinal access mirrors `SELECT_COLUMNS`'s order.
pub fn map_row(row: &Row) -> duckdb::Result<RegistryRow> {
    Ok(RegistryRow {
        siret: row.get(0)?,
        siren: row.get(1)?,
        is_active: row.get::<usize, String>(2)? == "A",
        legal_name: row.get(3)?,
        usual_name: row.get(4)?,
        sign_name: row.get(5)?,
        postal_code: row.get(6)?,
        commune_label: row.get(7)?,
        size_tranche: row.get(8)?,
        naf_code: row.get(9)?,
        sector_section: row.get(10)?,
        legal_category: row.get(11)?,
        lat: row.get(12)?,
        lon: row.get(13)?,
    })
}

/// Ensures the `sirene` table and its secondary indexes exist, ingesting
/// from `source_path` only when the table is missing (idempotent, per spec
/// §4.2). Fails fatally if the table is missing and the source file does
/// not exist.
pub fn ensure_loaded(store: &Store, source_path: &str) -> Result<(), StoreError> {
    if store.table_exists(TABLE)? {
        log::info!("registry table '{TABLE}' already present, skipping ingest");
    } else {
        if !Path::new(source_path).exists() {
            return Err(StoreError::MissingSource(source_path.to_string()));
        }
        log::info!("ingesting registry from {source_path}");
        store.execute_batch(&format!(
            "CREATE TABLE {TABLE} AS SELECT * FROM '{source_path}';"
        ))?;
        materialize_cached_coordinates(store)?;
    }
    ensure_indexes(store)
}

/// Resolves the open question in spec §9: `lat_cached`/`lon_cached` are not
/// part of the source file, so they are materialized here during ingest
/// from the packed geometry column, instead of calling `ST_X`/`ST_Y` on
/// every cascade query.
fn materialize_cached_coordinates(store: &Store) -> Result<(), StoreError> {
    store.execute_batch(&format!(
        "ALTER TABLE {TABLE} ADD COLUMN IF NOT EXISTS {lat} DOUBLE;
         ALTER TABLE {TABLE} ADD COLUMN IF NOT EXISTS {lon} DOUBLE;
         UPDATE {TABLE} SET {lat} = ST_Y({geom}), {lon} = ST_X({geom});",
        lat = columns::LAT_CACHED,
        lon = columns::LON_CACHED,
        geom = columns::GEOM,
    ))
}

fn ensure_indexes(store: &Store) -> Result<(), StoreError> {
    let index_specs = [
        ("idx_sirene_siret", columns::SIRET),
        ("idx_sirene_siren", columns::SIREN),
        ("idx_sirene_nic", columns::NIC),
        ("idx_sirene_legal_name", columns::LEGAL_NAME),
        ("idx_sirene_sign_name", columns::SIGN_NAME),
        ("idx_sirene_postal_code", columns::POSTAL_CODE),
        ("idx_sirene_commune_label", columns::COMMUNE_LABEL),
        ("idx_sirene_size_tranche", columns::SIZE_TRANCHE),
        ("idx_sirene_naf_code", columns::NAF_CODE),
        ("idx_sirene_is_head_office", columns::IS_HEAD_OFFICE),
    ];
    for (index_name, column) in index_specs {
        store.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {index_name} ON {TABLE}({column});"
        ))?;
    }
    Ok(())
}
