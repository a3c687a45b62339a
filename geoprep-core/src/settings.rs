//! Environment-driven configuration (spec §6), assembled with the `config`
//! crate the same way the teacher centralizes typed configuration in structs
//! such as `OsmImportConfiguration` — one typed `Settings` value built once
//! at process start and threaded explicitly through constructors rather than
//! read from a global.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to assemble configuration from environment: {0}")]
    BuildFailed(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub db_pool_size: usize,
    pub db_memory_limit: String,
    pub db_preserve_insertion_order: bool,

    pub path_source_sirene: String,
    pub path_source_stop_csv: String,
    pub path_source_offers_json: String,

    pub path_output_companies_geojson: String,
    pub path_output_offers_by_siret: String,
    pub path_output_transport_stops: String,
    pub path_output_stops_by_siret: String,
    pub path_output_graph: String,

    pub path_cache_gtfs: String,
}

impl Settings {
    /// Reads configuration from environment variables named exactly as in
    /// spec §6 (`DB_PATH`, `PATH_SOURCE_SIRENE`, ...), layered over sane
    /// defaults for the optional numeric/boolean knobs.
    pub fn from_env() -> Result<Settings, ConfigError> {
        let builder = config::Config::builder()
            .set_default("db_pool_size", 4)?
            .set_default("db_memory_limit", "8GB")?
            .set_default("db_preserve_insertion_order", false)?
            .set_default("path_cache_gtfs", "./gtfs_cache")?
            .set_default("path_output_companies_geojson", "./companies.geojson")?
            .set_default("path_output_offers_by_siret", "./offers_by_siret.json")?
            .set_default("path_output_transport_stops", "./transport_stops.json")?
            .set_default("path_output_stops_by_siret", "./stops_by_siret.json")?
            .set_default("path_output_graph", "./graph.json")?
            .add_source(config::Environment::default().try_parsing(true));
        let settings = builder.build()?.try_deserialize::<Settings>()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_keys_is_an_error() {
        // db_path has no default, so without the environment variable set
        // this must fail rather than silently producing an empty path.
        let result = Settings::from_env();
        if std::env::var("DB_PATH").is_err() {
            assert!(result.is_err());
        }
    }
}
