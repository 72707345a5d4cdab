use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No dataset locator configured and bundled sample '{0}' is missing")]
    NoLocator(PathBuf),

    #[error("Dataset file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Dataset format '{format}' of '{locator}' needs an array library this build does not include")]
    UnsupportedFormat { locator: String, format: String },

    #[error("Unrecognised dataset format for '{0}'")]
    UnknownFormat(String),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Data download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("I/O error staging CSV data for '{locator}'")]
    CsvReadIo {
        locator: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parsing error reading CSV data for '{locator}'")]
    CsvReadPolars {
        locator: String,
        #[source]
        source: PolarsError,
    },

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),
    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to scan dataset file '{0}'")]
    Scan(PathBuf, #[source] PolarsError),

    #[error("Failed to inspect dataset '{locator}'")]
    Inspect {
        locator: String,
        #[source]
        source: PolarsError,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
