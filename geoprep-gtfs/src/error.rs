use thiserror::Error;

/// Errors raised by the GTFS dataset aggregator (C8), fetcher (C9), parser
/// (C10), accessibility scorer (C11), and graph builder (C12).
#[derive(Debug, Error)]
pub enum GtfsError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to extract archive at {path}: {source}")]
    Extract {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read GTFS file {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("no usable candidate for dataset {0}")]
    NoCandidate(String),
}
