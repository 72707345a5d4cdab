use crate::dataset::dataset_ref::{DatasetRef, TIME_COLUMNS};
use crate::error::ClimateRiskError;
use crate::spatial::grid_locator::ResolvedPoint;
use crate::spatial::grid_point::GridPoint;
use crate::utils::date_from_epoch_days;
use crate::window::day_of_year::{DayOfYear, YEAR_LENGTH};
use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;

/// Column added to selected rows holding each sample's circular day distance.
pub const DAY_DISTANCE_COLUMN: &str = "day_distance";

pub trait ClimateFrameFilterExt {
    /// Keeps the rows belonging to one grid cell.
    fn filter_grid_point(self, lat_column: &str, lon_column: &str, point: GridPoint) -> LazyFrame;

    /// Keeps the rows whose calendar day lies within `radius_days` of `target`,
    /// across every year present, and records the distance in [`DAY_DISTANCE_COLUMN`].
    ///
    /// Calendar days are taken on a 366-day calendar so a month/day pair has the
    /// same position in leap and common years.
    fn filter_day_window(self, time_column: &str, target: DayOfYear, radius_days: u32) -> LazyFrame;
}

/// Day of year on the 366-day calendar: ordinal day, shifted by one after
/// February in common years.
fn leap_calendar_day(time: Expr) -> Expr {
    let ordinal = time.clone().dt().ordinal_day().cast(DataType::Int32);
    let after_february = time.clone().dt().month().cast(DataType::Int32).gt(lit(2));
    let common_year = time.dt().is_leap_year().not();
    ordinal
        + when(common_year.and(after_february))
            .then(lit(1i32))
            .otherwise(lit(0i32))
}

fn circular_day_distance(day: Expr, target: u32) -> Expr {
    let gap = day - lit(target as i32);
    let abs_gap = when(gap.clone().lt(lit(0i32)))
        .then(lit(0i32) - gap.clone())
        .otherwise(gap);
    let wrapped = lit(YEAR_LENGTH as i32) - abs_gap.clone();
    when(wrapped.clone().lt(abs_gap.clone()))
        .then(wrapped)
        .otherwise(abs_gap)
}

impl ClimateFrameFilterExt for LazyFrame {
    fn filter_grid_point(self, lat_column: &str, lon_column: &str, point: GridPoint) -> LazyFrame {
        self.filter(
            col(lat_column)
                .cast(DataType::Float64)
                .eq(lit(point.lat))
                .and(col(lon_column).cast(DataType::Float64).eq(lit(point.lon))),
        )
    }

    fn filter_day_window(self, time_column: &str, target: DayOfYear, radius_days: u32) -> LazyFrame {
        let time = col(time_column).cast(DataType::Date);
        self.with_column(
            circular_day_distance(leap_calendar_day(time), target.ordinal())
                .alias(DAY_DISTANCE_COLUMN),
        )
        .filter(col(DAY_DISTANCE_COLUMN).lt_eq(lit(radius_days as i32)))
    }
}

/// Samples of one grid cell falling inside a calendar window, across all years.
///
/// Rows are in chronological order.
#[derive(Debug, Clone)]
pub struct WindowSelection {
    /// The selected rows, all dataset columns plus [`DAY_DISTANCE_COLUMN`].
    pub frame: DataFrame,
    /// Dates of the selected samples, aligned with `frame` rows.
    pub timestamps: Vec<NaiveDate>,
    /// Grid coordinates actually used.
    pub grid_point: GridPoint,
    pub target: DayOfYear,
    pub radius_days: u32,
}

impl WindowSelection {
    pub fn samples(&self) -> usize {
        self.frame.height()
    }
}

/// Selects the window of `target ± radius_days` at the resolved grid point.
///
/// # Errors
///
/// [`ClimateRiskError::MissingTimeAxis`] when the dataset has no time column and
/// [`ClimateRiskError::EmptyWindow`] when no sample matches.
pub fn select_window(
    dataset: &DatasetRef,
    resolved: &ResolvedPoint,
    target: DayOfYear,
    radius_days: u32,
) -> Result<WindowSelection, ClimateRiskError> {
    let axes = dataset.axes();
    let time_column = axes
        .time
        .as_deref()
        .ok_or_else(|| ClimateRiskError::MissingTimeAxis(TIME_COLUMNS[0].to_string()))?;

    let mut frame = dataset.frame();
    if resolved.snapped {
        if let (Some(lat), Some(lon)) = (&axes.latitude, &axes.longitude) {
            frame = frame.filter_grid_point(lat, lon, resolved.point);
        }
    }

    let selected = frame
        .filter_day_window(time_column, target, radius_days)
        .sort_by_exprs([col(time_column)], SortMultipleOptions::default())
        .collect()?;

    debug!(
        "Selected {} samples within {} days of {} at ({}, {})",
        selected.height(),
        radius_days,
        target,
        resolved.point.lat,
        resolved.point.lon
    );

    if selected.height() == 0 {
        return Err(ClimateRiskError::EmptyWindow {
            target,
            radius: radius_days,
            lat: resolved.point.lat,
            lon: resolved.point.lon,
        });
    }

    let timestamps = selected
        .column(time_column)?
        .cast(&DataType::Date)?
        .cast(&DataType::Int32)?
        .i32()?
        .into_iter()
        .filter_map(|days| days.and_then(date_from_epoch_days))
        .collect();

    Ok(WindowSelection {
        frame: selected,
        timestamps,
        grid_point: resolved.point,
        target,
        radius_days,
    })
}
