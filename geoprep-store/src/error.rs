use thiserror::Error;

/// Errors raised by the embedded analytical store and its two loaders (C1,
/// C2, C3). `Init`/`MissingSource`/`SpatialExtension` are fatal and abort the
/// run (see spec §7's `ConfigError`/`StoreInitError`); `Query` is per-call
/// and never tears down the connection pool.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open analytical store at {path}: {source}")]
    Init {
        path: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("failed to load spatial extension: {0}")]
    SpatialExtension(#[source] duckdb::Error),
    #[error("source file is missing for first-run ingest: {0}")]
    MissingSource(String),
    #[error("query failed: {0}")]
    Query(#[source] duckdb::Error),
    #[error("schema introspection failed: {0}")]
    Introspection(#[source] duckdb::Error),
}
