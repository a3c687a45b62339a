use thiserror::Error;

/// Top-level error type for the `geoprep` binary. Each phase's failure
/// mode is wrapped rather than flattened, so a run's exit code and log line
/// can still say which sub-crate failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] geoprep_core::settings::ConfigError),
    #[error(transparent)]
    Store(#[from] geoprep_store::StoreError),
    #[error(transparent)]
    Offers(#[from] geoprep_offers::OffersError),
    #[error(transparent)]
    Gtfs(#[from] geoprep_gtfs::GtfsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}
