//! Geographic points: requested locations and dataset grid cells, with the
//! implementations needed to index grid cells in an `rstar` R-tree.

use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use climate_risk::LatLon;
///
/// let denver = LatLon(39.7392, -104.9903);
/// assert_eq!(denver.0, 39.7392); // Latitude
/// assert_eq!(denver.1, -104.9903); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

/// A grid cell centre of the dataset, as stored in its coordinate columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub lat: f64,
    /// Longitude in decimal degrees, in the dataset's own convention
    /// (either [-180, 180) or [0, 360)).
    pub lon: f64,
}

impl GridPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<LatLon> for GridPoint {
    fn from(value: LatLon) -> Self {
        GridPoint::new(value.0, value.1)
    }
}

impl RTreeObject for GridPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lon])
    }
}

/// Squared Euclidean distance in degree space.
///
/// Grid cells are regularly spaced in degrees, so snapping in degree space matches
/// selecting the nearest index along each coordinate axis.
impl PointDistance for GridPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.lat - point[0];
        let dy = self.lon - point[1];
        dx * dx + dy * dy
    }
}
