//! An opened, inspected dataset: the lazy table plus what was learned about its
//! axes, variables, grid and time coverage when it was opened.

use crate::spatial::grid_locator::GridLocator;
use crate::utils::date_from_epoch_days;
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;

/// Column names recognised as the time axis, in order of preference.
pub const TIME_COLUMNS: [&str; 2] = ["time", "date"];
/// Column names recognised as latitude.
pub const LATITUDE_COLUMNS: [&str; 2] = ["lat", "latitude"];
/// Column names recognised as longitude.
pub const LONGITUDE_COLUMNS: [&str; 2] = ["lon", "longitude"];

/// The index columns found in a dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Axes {
    pub time: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl Axes {
    fn detect(schema: &Schema) -> Self {
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|name| schema.contains(name))
                .map(|name| name.to_string())
        };
        Axes {
            time: find(&TIME_COLUMNS),
            latitude: find(&LATITUDE_COLUMNS),
            longitude: find(&LONGITUDE_COLUMNS),
        }
    }

    fn contains(&self, name: &str) -> bool {
        [&self.time, &self.latitude, &self.longitude]
            .iter()
            .any(|axis| axis.as_deref() == Some(name))
    }
}

/// A dataset opened by [`crate::DatasetHandle`].
///
/// Cheap to share behind an `Arc`; nothing in it is mutated after opening.
#[derive(Clone)]
pub struct DatasetRef {
    locator: String,
    name: String,
    frame: LazyFrame,
    axes: Axes,
    variables: Vec<String>,
    grid: Option<GridLocator>,
    time_range: Option<(NaiveDate, NaiveDate)>,
}

impl DatasetRef {
    /// Inspects `frame` and wraps it. Collects the coordinate columns once to
    /// build the grid index and scans the time axis for its range.
    pub fn from_frame(
        locator: impl Into<String>,
        name: impl Into<String>,
        frame: LazyFrame,
    ) -> PolarsResult<Self> {
        let locator = locator.into();
        let name = name.into();
        let schema = frame.clone().collect_schema()?;
        let axes = Axes::detect(&schema);

        let variables: Vec<String> = schema
            .iter_names()
            .map(|n| n.to_string())
            .filter(|n| !axes.contains(n))
            .collect();

        let grid = match (&axes.latitude, &axes.longitude) {
            (Some(lat), Some(lon)) => GridLocator::from_frame(frame.clone(), lat, lon)?,
            _ => {
                warn!("Dataset '{}' has no spatial coordinates; queries will not be snapped", name);
                None
            }
        };

        let time_range = match &axes.time {
            Some(time) => match Self::scan_time_range(frame.clone(), time) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Could not determine time range of dataset '{}': {}", name, e);
                    None
                }
            },
            None => None,
        };

        info!(
            "Opened dataset '{}' with {} variables, {} grid points, time range {:?}",
            name,
            variables.len(),
            grid.as_ref().map(|g| g.len()).unwrap_or(0),
            time_range
        );

        Ok(DatasetRef {
            locator,
            name,
            frame,
            axes,
            variables,
            grid,
            time_range,
        })
    }

    fn scan_time_range(frame: LazyFrame, time: &str) -> PolarsResult<Option<(NaiveDate, NaiveDate)>> {
        let as_days = col(time).cast(DataType::Date).cast(DataType::Int32);
        let bounds = frame
            .select([
                as_days.clone().min().alias("start"),
                as_days.max().alias("end"),
            ])
            .collect()?;
        let start = bounds.column("start")?.i32()?.get(0);
        let end = bounds.column("end")?.i32()?.get(0);
        Ok(match (start, end) {
            (Some(s), Some(e)) => date_from_epoch_days(s).zip(date_from_epoch_days(e)),
            _ => None,
        })
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A clone of the underlying lazy table.
    pub fn frame(&self) -> LazyFrame {
        self.frame.clone()
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// Non-axis columns, in schema order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub fn grid(&self) -> Option<&GridLocator> {
        self.grid.as_ref()
    }

    pub fn time_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.time_range
    }

    /// "YYYY-MM-DD to YYYY-MM-DD", or "unknown" for datasets without a time axis.
    pub fn time_range_label(&self) -> String {
        match self.time_range {
            Some((start, end)) => format!("{} to {}", start, end),
            None => "unknown".to_string(),
        }
    }
}

impl std::fmt::Debug for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetRef")
            .field("locator", &self.locator)
            .field("name", &self.name)
            .field("axes", &self.axes)
            .field("variables", &self.variables)
            .field("grid_points", &self.grid.as_ref().map(|g| g.len()))
            .field("time_range", &self.time_range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(raw: &[&str]) -> Vec<NaiveDate> {
        raw.iter()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap())
            .collect()
    }

    #[test]
    fn test_inspects_axes_variables_and_range() -> PolarsResult<()> {
        let df = df!(
            "time" => dates(&["2019-03-14", "2019-03-14", "2023-03-16", "2023-03-16"]),
            "lat" => [39.5, 40.0, 39.5, 40.0],
            "lon" => [-105.0, -105.0, -105.0, -105.0],
            "T2MMAX" => [290.0, 291.0, 292.0, 293.0],
            "RH2M" => [40.0, 41.0, 42.0, 43.0]
        )?;
        let dataset = DatasetRef::from_frame("mem://test", "test", df.lazy())?;

        assert_eq!(dataset.axes().time.as_deref(), Some("time"));
        assert_eq!(dataset.axes().latitude.as_deref(), Some("lat"));
        assert_eq!(dataset.variables(), ["T2MMAX".to_string(), "RH2M".to_string()]);
        assert!(dataset.has_variable("RH2M"));
        assert!(!dataset.has_variable("lat"));
        assert_eq!(dataset.grid().map(|g| g.len()), Some(2));
        assert_eq!(dataset.time_range_label(), "2019-03-14 to 2023-03-16");
        Ok(())
    }

    #[test]
    fn test_dataset_without_axes() -> PolarsResult<()> {
        let df = df!("T2MMAX" => [290.0, 291.0])?;
        let dataset = DatasetRef::from_frame("mem://bare", "bare", df.lazy())?;
        assert_eq!(dataset.axes(), &Axes::default());
        assert!(dataset.grid().is_none());
        assert!(dataset.time_range().is_none());
        assert_eq!(dataset.time_range_label(), "unknown");
        Ok(())
    }
}
