//! Engine configuration, from code or from `CLIMATE_RISK_*` environment variables.

use crate::error::ClimateRiskError;
use crate::fallback::{FallbackMode, PayloadSource};
use crate::utils::get_cache_dir;
use bon::Builder;
use log::warn;
use std::env;
use std::path::PathBuf;

pub const ENV_DATASET: &str = "CLIMATE_RISK_DATASET";
pub const ENV_WINDOW_DAYS: &str = "CLIMATE_RISK_WINDOW_DAYS";
pub const ENV_FORCE_MOCK: &str = "CLIMATE_RISK_FORCE_MOCK";
pub const ENV_ALLOW_FALLBACK: &str = "CLIMATE_RISK_ALLOW_FALLBACK";
pub const ENV_MOCK_PAYLOAD: &str = "CLIMATE_RISK_MOCK_PAYLOAD";
pub const ENV_CACHE_DIR: &str = "CLIMATE_RISK_CACHE_DIR";
pub const ENV_DATA_SOURCE: &str = "CLIMATE_RISK_DATA_SOURCE";

pub const DEFAULT_WINDOW_DAYS: u32 = 3;
pub const DEFAULT_DATA_SOURCE: &str = "MERRA-2 (NASA GES DISC)";

/// Settings for a [`crate::ClimateEngine`].
///
/// # Examples
///
/// ```
/// use climate_risk::{EngineConfig, FallbackMode};
///
/// let config = EngineConfig::builder()
///     .dataset("/srv/merra2/denver.parquet")
///     .allow_fallback(true)
///     .build();
/// assert_eq!(config.window_days, 3);
/// assert_eq!(config.mode(), FallbackMode::LiveWithFallback);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct EngineConfig {
    /// Dataset path or URL. The bundled sample is used when unset.
    #[builder(into)]
    pub dataset: Option<String>,
    /// Calendar-day radius of the sampling window.
    #[builder(default = DEFAULT_WINDOW_DAYS)]
    pub window_days: u32,
    /// `Some(true)` serves only the static payload, `Some(false)` only live data.
    pub force_mock: Option<bool>,
    /// Whether live failures may be replaced by the static payload when
    /// `force_mock` is unset.
    #[builder(default)]
    pub allow_fallback: bool,
    #[builder(default)]
    pub payload: PayloadSource,
    /// Where downloaded datasets are cached. Defaults to the user cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Label reported as `data_source` in query metadata.
    #[builder(into, default = DEFAULT_DATA_SOURCE.to_string())]
    pub data_source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::builder().build()
    }
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        other => {
            warn!("Ignoring {}={:?}: expected true or false", key, other);
            None
        }
    }
}

fn parse_window_days(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(days) => days.clamp(0, u32::MAX as i64) as u32,
        Err(_) => {
            warn!(
                "Ignoring {}={:?}: expected an integer, using {}",
                ENV_WINDOW_DAYS, raw, DEFAULT_WINDOW_DAYS
            );
            DEFAULT_WINDOW_DAYS
        }
    }
}

impl EngineConfig {
    /// Reads the `CLIMATE_RISK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds a configuration from any variable lookup. Unset or blank values
    /// take their defaults; malformed ones are logged and ignored.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        EngineConfig {
            dataset: get(ENV_DATASET).map(|v| v.trim().to_string()),
            window_days: get(ENV_WINDOW_DAYS)
                .map(|v| parse_window_days(&v))
                .unwrap_or(DEFAULT_WINDOW_DAYS),
            force_mock: get(ENV_FORCE_MOCK).and_then(|v| parse_flag(ENV_FORCE_MOCK, &v)),
            allow_fallback: get(ENV_ALLOW_FALLBACK)
                .and_then(|v| parse_flag(ENV_ALLOW_FALLBACK, &v))
                .unwrap_or(false),
            payload: get(ENV_MOCK_PAYLOAD)
                .map(|v| PayloadSource::File(PathBuf::from(v.trim())))
                .unwrap_or_default(),
            cache_dir: get(ENV_CACHE_DIR).map(|v| PathBuf::from(v.trim())),
            data_source: get(ENV_DATA_SOURCE).unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string()),
        }
    }

    /// The default fallback policy for queries that do not pick one.
    pub fn mode(&self) -> FallbackMode {
        FallbackMode::from_flags(self.force_mock, self.allow_fallback)
    }

    pub fn resolved_cache_dir(&self) -> Result<PathBuf, ClimateRiskError> {
        self.cache_dir
            .clone()
            .or_else(get_cache_dir)
            .ok_or(ClimateRiskError::CacheDirResolution)
    }
}
