use crate::dataset::error::DatasetError;
use crate::window::day_of_year::DayOfYear;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClimateRiskError {
    #[error("Dataset resource unavailable")]
    ResourceUnavailable(#[source] DatasetError),

    #[error("Dataset has no time axis (looked for column '{0}')")]
    MissingTimeAxis(String),

    #[error("No samples within {radius} days of {target} at grid point ({lat}, {lon})")]
    EmptyWindow {
        target: DayOfYear,
        radius: u32,
        lat: f64,
        lon: f64,
    },

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(#[source] DatasetError),

    #[error("Invalid day of year '{0}', expected MM-DD")]
    InvalidDayOfYear(String),

    #[error("Failed processing DataFrame: {0}")]
    Polars(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed to read fallback payload '{0}'")]
    MockPayloadRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse fallback payload")]
    MockPayloadParse(#[source] serde_json::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution,

    #[error("Failed to render query response as CSV")]
    Export(#[source] PolarsError),

    #[error("Failed to serialize query response")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write export file '{0}'")]
    ExportIo(PathBuf, #[source] std::io::Error),
}

impl ClimateRiskError {
    /// Whether a live failure may be replaced by the static payload.
    ///
    /// Missing array support is never substituted, and neither is bad input.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ClimateRiskError::ResourceUnavailable(_)
                | ClimateRiskError::MissingTimeAxis(_)
                | ClimateRiskError::EmptyWindow { .. }
                | ClimateRiskError::Polars(_)
                | ClimateRiskError::TaskJoin(_)
        )
    }
}

impl From<DatasetError> for ClimateRiskError {
    fn from(value: DatasetError) -> Self {
        match value {
            DatasetError::UnsupportedFormat { .. } => {
                ClimateRiskError::UnsupportedEnvironment(value)
            }
            other => ClimateRiskError::ResourceUnavailable(other),
        }
    }
}
