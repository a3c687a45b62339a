use thiserror::Error;

/// Errors raised by the offer stream reader (C4) and identity resolver (C5).
#[derive(Debug, Error)]
pub enum OffersError {
    #[error("failed to open offer stream at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed offer stream: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("identity resolver query failed: {0}")]
    Store(#[from] geoprep_store::StoreError),
}
