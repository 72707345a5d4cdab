//! Serializable result records returned by the engine.
//!
//! Field names follow the JSON payload format of the bundled fallback file, so a
//! static payload and a live computation share one shape.

use crate::spatial::grid_point::{GridPoint, LatLon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    pub unit: String,
}

/// Outcome of one condition over the selected window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    /// Always present for live results; static payloads may leave it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_percent: Option<f64>,
    pub threshold: Threshold,
    #[serde(default)]
    pub trend: String,
    #[serde(default)]
    pub historical_values: Vec<f64>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub data_source: String,
    /// "YYYY-MM-DD to YYYY-MM-DD" over the whole dataset.
    pub time_range: String,
    pub units: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_point: Option<GridPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
}

/// The `{results, metadata}` body shared by live computations and static payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub results: BTreeMap<String, ConditionResult>,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl From<LatLon> for Location {
    fn from(value: LatLon) -> Self {
        Location {
            lat: value.0,
            lon: value.1,
        }
    }
}

/// The request as received, echoed back alongside the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEcho {
    pub location: Location,
    pub date_of_year: String,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadOrigin {
    Live,
    Mock,
}

impl fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadOrigin::Live => write!(f, "live"),
            PayloadOrigin::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: QueryEcho,
    pub results: BTreeMap<String, ConditionResult>,
    pub metadata: QueryMetadata,
    pub origin: PayloadOrigin,
}

impl QueryResponse {
    pub fn new(query: QueryEcho, report: ConditionReport, origin: PayloadOrigin) -> Self {
        QueryResponse {
            query,
            results: report.results,
            metadata: report.metadata,
            origin,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.origin == PayloadOrigin::Mock
    }
}
