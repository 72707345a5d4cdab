//! The main entry point: answers "how often did this condition occur around this
//! day of the year at this place" from a gridded climate record.

use crate::conditions::evaluator::evaluate;
use crate::conditions::units::UnitNormalizer;
use crate::config::EngineConfig;
use crate::dataset::dataset_ref::DatasetRef;
use crate::dataset::error::DatasetError;
use crate::dataset::handle::DatasetHandle;
use crate::error::ClimateRiskError;
use crate::fallback::{FallbackCoordinator, FallbackMode};
use crate::response::result::{ConditionReport, QueryEcho, QueryMetadata, QueryResponse};
use crate::spatial::grid_locator::resolve;
use crate::spatial::grid_point::LatLon;
use crate::utils::{ensure_cache_dir_exists, round1};
use crate::window::day_of_year::DayOfYear;
use crate::window::selector::select_window;
use bon::bon;
use chrono::{SecondsFormat, Utc};
use log::info;
use std::sync::Arc;
use tokio::task;

/// Reported as `units` in live metadata.
pub const UNITS_LABEL: &str = "SI with conversions applied";

/// Computes condition probabilities for one location and calendar day against an
/// already opened dataset.
///
/// This is the synchronous core used by [`ClimateEngine::compute_conditions`]:
/// snap to the grid, select the window, evaluate the conditions and describe
/// the query in metadata.
pub fn compute_report<S: AsRef<str>>(
    dataset: &DatasetRef,
    normalizer: &UnitNormalizer,
    location: LatLon,
    target: DayOfYear,
    window_days: u32,
    conditions: &[S],
    data_source: &str,
) -> Result<ConditionReport, ClimateRiskError> {
    let resolved = resolve(dataset, location);
    let selection = select_window(dataset, &resolved, target, window_days)?;
    let results = evaluate(&selection, normalizer, conditions);

    let metadata = QueryMetadata {
        data_source: data_source.to_string(),
        time_range: dataset.time_range_label(),
        units: UNITS_LABEL.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        window_days: Some(window_days),
        samples: Some(selection.samples()),
        grid_point: Some(selection.grid_point),
        distance_km: resolved.distance_km.map(round1),
        dataset_name: Some(dataset.name().to_string()),
    };
    Ok(ConditionReport { results, metadata })
}

/// The climate condition probability engine.
///
/// Owns the open dataset (see [`DatasetHandle`]) and the static fallback payload.
/// Create one per process with [`ClimateEngine::new()`] (configuration from the
/// environment) or [`ClimateEngine::with_config()`], then share it.
///
/// # Examples
///
/// ```rust,no_run
/// # use climate_risk::{ClimateEngine, ClimateRiskError, LatLon};
/// # #[tokio::main]
/// # async fn main() -> Result<(), ClimateRiskError> {
/// let engine = ClimateEngine::new().await?;
/// let response = engine
///     .compute_conditions()
///     .location(LatLon(39.7392, -104.9903))
///     .date_of_year("07-15")
///     .conditions(vec!["very_hot".to_string(), "very_wet".to_string()])
///     .call()
///     .await?;
///
/// for (name, result) in &response.results {
///     println!("{}: {:?}% ({})", name, result.probability_percent, result.trend);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ClimateEngine {
    config: EngineConfig,
    dataset: DatasetHandle,
    normalizer: Arc<UnitNormalizer>,
    fallback: FallbackCoordinator,
}

#[bon]
impl ClimateEngine {
    /// Creates an engine from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateRiskError::CacheDirResolution`] if no cache directory is
    /// configured and none can be determined, and
    /// [`ClimateRiskError::ResourceUnavailable`] if it cannot be created.
    pub async fn with_config(config: EngineConfig) -> Result<Self, ClimateRiskError> {
        let cache_dir = config.resolved_cache_dir()?;
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| DatasetError::CacheDirCreation(cache_dir.clone(), e))?;
        info!(
            "Climate engine using cache {:?}, default mode {:?}",
            cache_dir,
            config.mode()
        );
        Ok(Self {
            dataset: DatasetHandle::new(config.dataset.clone(), &cache_dir),
            fallback: FallbackCoordinator::new(config.payload.clone()),
            normalizer: Arc::new(UnitNormalizer::default()),
            config,
        })
    }

    /// Creates an engine configured from the `CLIMATE_RISK_*` environment variables.
    pub async fn new() -> Result<Self, ClimateRiskError> {
        Self::with_config(EngineConfig::from_env()).await
    }

    /// Replaces the default MERRA-2 unit conventions.
    pub fn with_normalizer(mut self, normalizer: UnitNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens (or returns the already open) dataset, e.g. to fail fast at startup.
    pub async fn open_dataset(&self, locator: Option<&str>) -> Result<Arc<DatasetRef>, ClimateRiskError> {
        self.dataset.open(locator).await
    }

    /// Releases the open dataset. The next query opens it again.
    pub async fn close(&self) {
        self.dataset.close().await;
    }

    /// Computes exceedance probabilities and trends for the requested conditions.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** Point of interest, snapped to the nearest grid cell.
    /// * `.date_of_year(impl Into<String>)`: **Required.** Target calendar day as `MM-DD`.
    /// * `.conditions(Vec<String>)`: **Required.** Catalog names such as `"very_hot"`. Unknown
    ///   names and conditions the dataset cannot support are left out of the results.
    /// * `.mode(FallbackMode)`: Optional. Defaults to the configured policy.
    /// * `.dataset(&str)`: Optional. Dataset locator overriding the configured one.
    /// * `.window_days(u32)`: Optional. Window radius overriding the configured one.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateRiskError::InvalidDayOfYear`] for a malformed date, whatever the mode.
    /// In [`FallbackMode::LiveOnly`] every live failure is returned, e.g.
    /// [`ClimateRiskError::ResourceUnavailable`] for a locator that cannot be opened or
    /// [`ClimateRiskError::EmptyWindow`] when no sample falls in the window.
    #[builder]
    pub async fn compute_conditions(
        &self,
        location: LatLon,
        #[builder(into)] date_of_year: String,
        conditions: Vec<String>,
        mode: Option<FallbackMode>,
        dataset: Option<&str>,
        window_days: Option<u32>,
    ) -> Result<QueryResponse, ClimateRiskError> {
        let date_of_year = date_of_year.trim().to_string();
        let target: DayOfYear = date_of_year
            .parse()
            .map_err(|_| ClimateRiskError::InvalidDayOfYear(date_of_year.clone()))?;
        let mode = mode.unwrap_or_else(|| self.config.mode());
        let window_days = window_days.unwrap_or(self.config.window_days);

        let (report, origin) = self
            .fallback
            .run(mode, || self.compute_live(location, target, window_days, &conditions, dataset))
            .await?;

        Ok(QueryResponse::new(
            QueryEcho {
                location: location.into(),
                date_of_year,
                conditions,
            },
            report,
            origin,
        ))
    }

    async fn compute_live(
        &self,
        location: LatLon,
        target: DayOfYear,
        window_days: u32,
        conditions: &[String],
        locator: Option<&str>,
    ) -> Result<ConditionReport, ClimateRiskError> {
        let dataset = self.dataset.open(locator).await?;
        let normalizer = Arc::clone(&self.normalizer);
        let conditions = conditions.to_vec();
        let data_source = self.config.data_source.clone();

        task::spawn_blocking(move || {
            compute_report(
                &dataset,
                &normalizer,
                location,
                target,
                window_days,
                conditions.as_slice(),
                &data_source,
            )
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::parse_payload;
    use crate::response::result::PayloadOrigin;
    use std::path::Path;
    use tempfile::TempDir;

    fn all_conditions() -> Vec<String> {
        crate::conditions::catalog::names().map(String::from).collect()
    }

    async fn engine_in(tmp: &TempDir, dataset: Option<String>) -> ClimateEngine {
        let config = EngineConfig::builder()
            .maybe_dataset(dataset)
            .cache_dir(tmp.path().join("cache"))
            .build();
        ClimateEngine::with_config(config).await.unwrap()
    }

    fn write_five_years(dir: &Path) -> String {
        let mut csv = String::from("time,lat,lon,T2MMAX\n");
        for (year, celsius) in (2019..).zip([30.0, 33.0, 35.0, 31.0, 34.0]) {
            csv.push_str(&format!("{}-03-15,39.5,-105.0,{:.2}\n", year, celsius + 273.15));
            csv.push_str(&format!("{}-03-16,39.5,-105.0,{:.2}\n", year, 40.0 + 273.15));
        }
        let path = dir.join("five_years.csv");
        std::fs::write(&path, csv).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_bundled_sample_live_query() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(&tmp, None).await;

        let response = engine
            .compute_conditions()
            .location(LatLon(39.7392, -104.9903))
            .date_of_year("07-15")
            .conditions(all_conditions())
            .mode(FallbackMode::LiveOnly)
            .call()
            .await?;

        assert_eq!(response.origin, PayloadOrigin::Live);
        assert_eq!(response.results.len(), 5);
        for result in response.results.values() {
            let p = result.probability_percent.unwrap();
            assert!((0.0..=100.0).contains(&p));
            assert!(result.historical_values.len() <= 42);
        }

        let metadata = &response.metadata;
        assert_eq!(metadata.samples, Some(42));
        assert_eq!(metadata.window_days, Some(3));
        assert_eq!(metadata.time_range, "2018-01-01 to 2023-12-31");
        assert_eq!(metadata.dataset_name.as_deref(), Some("sample_denver_2018_2023"));
        let grid = metadata.grid_point.unwrap();
        assert_eq!((grid.lat, grid.lon), (39.5, -105.0));
        assert!(metadata.distance_km.unwrap() > 0.0);
        assert!(metadata.generated_at.ends_with('Z'));

        assert_eq!(response.query.date_of_year, "07-15");
        assert_eq!(response.query.conditions.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_winter_query_has_no_dangerous_heat() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(&tmp, None).await;

        let response = engine
            .compute_conditions()
            .location(LatLon(39.7392, -104.9903))
            .date_of_year("01-15")
            .conditions(vec!["very_uncomfortable".into(), "very_cold".into()])
            .mode(FallbackMode::LiveOnly)
            .call()
            .await?;

        assert_eq!(response.origin, PayloadOrigin::Live);
        assert_eq!(response.results["very_uncomfortable"].probability_percent, Some(0.0));
        assert!(response.results["very_cold"].probability_percent.unwrap() > 50.0);
        assert!(response.results["very_uncomfortable"]
            .historical_values
            .iter()
            .all(|hi| *hi < 25.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_exact_day_window_probability() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let locator = write_five_years(tmp.path());
        let engine = engine_in(&tmp, Some(locator)).await;

        let response = engine
            .compute_conditions()
            .location(LatLon(39.6, -105.1))
            .date_of_year("03-15")
            .conditions(vec!["very_hot".into(), "very_wet".into(), "very_sunny".into()])
            .window_days(0)
            .call()
            .await?;

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results["very_hot"].probability_percent, Some(60.0));
        assert_eq!(response.metadata.samples, Some(5));
        assert_eq!(response.metadata.time_range, "2019-03-15 to 2023-03-16");
        Ok(())
    }

    #[tokio::test]
    async fn test_live_only_invalid_locator_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(&tmp, None).await;

        let result = engine
            .compute_conditions()
            .location(LatLon(39.7, -105.0))
            .date_of_year("03-15")
            .conditions(all_conditions())
            .mode(FallbackMode::LiveOnly)
            .dataset("/definitely/not/here/merra2.parquet")
            .call()
            .await;
        assert!(matches!(result, Err(ClimateRiskError::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_mock_only_returns_payload_verbatim() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(&tmp, Some("/definitely/not/here.parquet".into())).await;

        let response = engine
            .compute_conditions()
            .location(LatLon(51.5, -0.1))
            .date_of_year("12-25")
            .conditions(vec!["very_cold".into()])
            .mode(FallbackMode::MockOnly)
            .call()
            .await?;

        let bundled = parse_payload(include_str!("../data/mock_response.json"))?;
        assert_eq!(response.origin, PayloadOrigin::Mock);
        assert_eq!(response.results, bundled.results);
        assert_eq!(response.metadata, bundled.metadata);
        assert_eq!(response.query.conditions, vec!["very_cold".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fallback_on_empty_window_and_missing_dataset() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let locator = write_five_years(tmp.path());
        let engine = engine_in(&tmp, Some(locator)).await;

        let strict = engine
            .compute_conditions()
            .location(LatLon(39.5, -105.0))
            .date_of_year("08-01")
            .conditions(all_conditions())
            .window_days(0)
            .call()
            .await;
        assert!(matches!(strict, Err(ClimateRiskError::EmptyWindow { .. })));

        let lenient = engine
            .compute_conditions()
            .location(LatLon(39.5, -105.0))
            .date_of_year("08-01")
            .conditions(all_conditions())
            .window_days(0)
            .mode(FallbackMode::LiveWithFallback)
            .call()
            .await?;
        assert!(lenient.is_mock());

        let missing = engine
            .compute_conditions()
            .location(LatLon(39.5, -105.0))
            .date_of_year("03-15")
            .conditions(all_conditions())
            .dataset("/definitely/not/here/merra2.csv.gz")
            .mode(FallbackMode::LiveWithFallback)
            .call()
            .await?;
        assert!(missing.is_mock());
        Ok(())
    }

    #[tokio::test]
    async fn test_never_substituted_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine_in(&tmp, None).await;

        let netcdf = engine
            .compute_conditions()
            .location(LatLon(39.5, -105.0))
            .date_of_year("03-15")
            .conditions(all_conditions())
            .dataset("/data/merra2_sample_denver_2018_2023.nc")
            .mode(FallbackMode::LiveWithFallback)
            .call()
            .await;
        assert!(matches!(netcdf, Err(ClimateRiskError::UnsupportedEnvironment(_))));

        for mode in [FallbackMode::MockOnly, FallbackMode::LiveWithFallback] {
            let bad_date = engine
                .compute_conditions()
                .location(LatLon(39.5, -105.0))
                .date_of_year("02-30")
                .conditions(all_conditions())
                .mode(mode)
                .call()
                .await;
            assert!(matches!(bad_date, Err(ClimateRiskError::InvalidDayOfYear(_))));
        }
    }

    #[tokio::test]
    async fn test_close_releases_dataset() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let locator = write_five_years(tmp.path());
        let engine = engine_in(&tmp, Some(locator)).await;

        let first = engine.open_dataset(None).await?;
        assert!(Arc::ptr_eq(&first, &engine.open_dataset(None).await?));
        engine.close().await;
        assert!(!Arc::ptr_eq(&first, &engine.open_dataset(None).await?));
        Ok(())
    }
}
