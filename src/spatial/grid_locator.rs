use crate::dataset::dataset_ref::DatasetRef;
use crate::spatial::grid_point::{GridPoint, LatLon};
use haversine::{distance, Location as HaversineLocation, Units};
use log::debug;
use ordered_float::OrderedFloat;
use polars::prelude::*;
use rstar::RTree;
use std::collections::HashSet;

/// Spatial index over the distinct grid cells of a dataset.
#[derive(Debug, Clone)]
pub struct GridLocator {
    rtree: RTree<GridPoint>,
    // Datasets on a [0, 360) longitude convention need requests shifted.
    positive_longitudes: bool,
}

/// Outcome of snapping a requested location to the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPoint {
    /// Coordinates actually used for the query.
    pub point: GridPoint,
    /// Great-circle distance from the request, when a grid was available.
    pub distance_km: Option<f64>,
    /// `false` when the dataset has no spatial coordinates and the request passed through.
    pub snapped: bool,
}

impl GridLocator {
    /// Builds the index from raw coordinate pairs, collapsing duplicates.
    pub fn new(coordinates: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut seen = HashSet::new();
        let points: Vec<GridPoint> = coordinates
            .into_iter()
            .filter(|(lat, lon)| lat.is_finite() && lon.is_finite())
            .filter(|(lat, lon)| seen.insert((OrderedFloat(*lat), OrderedFloat(*lon))))
            .map(|(lat, lon)| GridPoint::new(lat, lon))
            .collect();
        if points.is_empty() {
            return None;
        }
        let positive_longitudes = points.iter().all(|p| p.lon >= 0.0)
            && points.iter().any(|p| p.lon > 180.0);
        Some(GridLocator {
            rtree: RTree::bulk_load(points),
            positive_longitudes,
        })
    }

    /// Reads the distinct `(lat, lon)` pairs from a frame's coordinate columns.
    pub fn from_frame(frame: LazyFrame, lat_column: &str, lon_column: &str) -> PolarsResult<Option<Self>> {
        let coords = frame
            .select([
                col(lat_column).cast(DataType::Float64).alias("lat"),
                col(lon_column).cast(DataType::Float64).alias("lon"),
            ])
            .unique(None, UniqueKeepStrategy::Any)
            .collect()?;
        let lats = coords.column("lat")?.f64()?;
        let lons = coords.column("lon")?.f64()?;
        let pairs = lats
            .into_iter()
            .zip(lons.into_iter())
            .filter_map(|(lat, lon)| Some((lat?, lon?)));
        Ok(Self::new(pairs))
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// Maps a request longitude onto the dataset's longitude convention.
    fn align_longitude(&self, lon: f64) -> f64 {
        let normalized = (lon + 180.0).rem_euclid(360.0) - 180.0;
        if self.positive_longitudes && normalized < 0.0 {
            normalized + 360.0
        } else {
            normalized
        }
    }

    /// Nearest grid cell to `location`, with its haversine distance in km.
    pub fn nearest(&self, location: LatLon) -> Option<(GridPoint, f64)> {
        let query = [location.0, self.align_longitude(location.1)];
        let nearest = self.rtree.nearest_neighbor(&query)?;
        let dist_km = distance(
            HaversineLocation {
                latitude: location.0,
                longitude: location.1,
            },
            HaversineLocation {
                latitude: nearest.lat,
                longitude: nearest.lon,
            },
            Units::Kilometers,
        );
        Some((*nearest, dist_km))
    }
}

/// Snaps `location` to the dataset's nearest grid cell.
///
/// Datasets without coordinate columns cannot be snapped; the request is returned as is.
pub fn resolve(dataset: &DatasetRef, location: LatLon) -> ResolvedPoint {
    match dataset.grid().and_then(|grid| grid.nearest(location)) {
        Some((point, distance_km)) => {
            debug!(
                "Resolved ({}, {}) to grid point ({}, {}) at {:.1} km",
                location.0, location.1, point.lat, point.lon, distance_km
            );
            ResolvedPoint {
                point,
                distance_km: Some(distance_km),
                snapped: true,
            }
        }
        None => ResolvedPoint {
            point: GridPoint::from(location),
            distance_km: None,
            snapped: false,
        },
    }
}
