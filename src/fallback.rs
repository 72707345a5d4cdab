//! Choice between live computation and the static fallback payload.

use crate::error::ClimateRiskError;
use crate::response::result::{ConditionReport, PayloadOrigin};
use log::{info, warn};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::OnceCell;

const BUNDLED_PAYLOAD: &str = include_str!("../data/mock_response.json");

/// Per-query policy for using live data or the static payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Live data only; failures reach the caller unchanged.
    #[default]
    LiveOnly,
    /// Always the static payload; the dataset is never touched.
    MockOnly,
    /// Live data, replaced by the static payload when it is unavailable.
    LiveWithFallback,
}

impl FallbackMode {
    /// Collapses a tri-state force-mock flag and the fallback-allowed flag.
    ///
    /// ```
    /// use climate_risk::FallbackMode;
    ///
    /// assert_eq!(FallbackMode::from_flags(Some(true), false), FallbackMode::MockOnly);
    /// assert_eq!(FallbackMode::from_flags(Some(false), true), FallbackMode::LiveOnly);
    /// assert_eq!(FallbackMode::from_flags(None, true), FallbackMode::LiveWithFallback);
    /// assert_eq!(FallbackMode::from_flags(None, false), FallbackMode::LiveOnly);
    /// ```
    pub fn from_flags(force_mock: Option<bool>, allow_fallback: bool) -> Self {
        match (force_mock, allow_fallback) {
            (Some(true), _) => FallbackMode::MockOnly,
            (Some(false), _) => FallbackMode::LiveOnly,
            (None, true) => FallbackMode::LiveWithFallback,
            (None, false) => FallbackMode::LiveOnly,
        }
    }
}

/// Where the static payload is read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadSource {
    /// The JSON file compiled into the crate.
    #[default]
    Bundled,
    File(PathBuf),
}

impl PayloadSource {
    pub async fn load(&self) -> Result<ConditionReport, ClimateRiskError> {
        match self {
            PayloadSource::Bundled => parse_payload(BUNDLED_PAYLOAD),
            PayloadSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ClimateRiskError::MockPayloadRead(path.clone(), e))?;
                parse_payload(&raw)
            }
        }
    }
}

pub fn parse_payload(raw: &str) -> Result<ConditionReport, ClimateRiskError> {
    serde_json::from_str(raw).map_err(ClimateRiskError::MockPayloadParse)
}

/// Runs a live computation under a [`FallbackMode`], reading the static payload
/// at most once.
pub struct FallbackCoordinator {
    source: PayloadSource,
    payload: OnceCell<ConditionReport>,
}

impl FallbackCoordinator {
    pub fn new(source: PayloadSource) -> Self {
        Self {
            source,
            payload: OnceCell::new(),
        }
    }

    /// The static payload, verbatim.
    pub async fn static_payload(&self) -> Result<ConditionReport, ClimateRiskError> {
        self.payload
            .get_or_try_init(|| self.source.load())
            .await
            .cloned()
    }

    /// Resolves one query. The returned report is either entirely live or
    /// entirely the static payload.
    pub async fn run<F, Fut>(
        &self,
        mode: FallbackMode,
        live: F,
    ) -> Result<(ConditionReport, PayloadOrigin), ClimateRiskError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ConditionReport, ClimateRiskError>>,
    {
        match mode {
            FallbackMode::MockOnly => {
                info!("Serving static payload (mock mode)");
                Ok((self.static_payload().await?, PayloadOrigin::Mock))
            }
            FallbackMode::LiveOnly => Ok((live().await?, PayloadOrigin::Live)),
            FallbackMode::LiveWithFallback => match live().await {
                Ok(report) => Ok((report, PayloadOrigin::Live)),
                Err(e) if e.allows_fallback() => {
                    warn!("Live computation failed, substituting static payload: {}", e);
                    match self.static_payload().await {
                        Ok(payload) => Ok((payload, PayloadOrigin::Mock)),
                        Err(payload_error) => {
                            warn!("Static payload unavailable: {}", payload_error);
                            Err(e)
                        }
                    }
                }
                Err(e) => Err(e),
            },
        }
    }
}
