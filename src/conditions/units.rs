//! Conversion of raw dataset units into the units catalog thresholds are
//! expressed in.

use std::collections::HashMap;

const KELVIN_OFFSET: f64 = 273.15;
const SECONDS_PER_DAY: f64 = 86_400.0;
const MS_TO_KMH: f64 = 3.6;

/// A named conversion applied element-wise to a variable's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitTransform {
    Identity,
    /// K → °C
    KelvinToCelsius,
    /// kg m⁻² s⁻¹ → mm/day
    PrecipRateToMmPerDay,
    /// m/s → km/h
    MetersPerSecondToKmPerHour,
}

impl UnitTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            UnitTransform::Identity => value,
            UnitTransform::KelvinToCelsius => value - KELVIN_OFFSET,
            UnitTransform::PrecipRateToMmPerDay => value * SECONDS_PER_DAY,
            UnitTransform::MetersPerSecondToKmPerHour => value * MS_TO_KMH,
        }
    }

    /// Parses the strategy names accepted in configuration.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" => Some(UnitTransform::Identity),
            "kelvin_to_celsius" | "k_to_c" => Some(UnitTransform::KelvinToCelsius),
            "precip_rate_to_mm_per_day" | "kg_m2_s_to_mm_day" => {
                Some(UnitTransform::PrecipRateToMmPerDay)
            }
            "ms_to_kmh" | "meters_per_second_to_km_per_hour" => {
                Some(UnitTransform::MetersPerSecondToKmPerHour)
            }
            _ => None,
        }
    }
}

/// Registry of transforms keyed by dataset variable name.
///
/// Variables without an entry pass through unchanged.
#[derive(Debug, Clone)]
pub struct UnitNormalizer {
    transforms: HashMap<String, UnitTransform>,
}

impl Default for UnitNormalizer {
    /// The MERRA-2 variable conventions.
    fn default() -> Self {
        let mut normalizer = Self::empty();
        for variable in ["T2M", "T2MMAX", "T2MMIN"] {
            normalizer.register(variable, UnitTransform::KelvinToCelsius);
        }
        for variable in ["PRECTOT", "PRECTOTCORR"] {
            normalizer.register(variable, UnitTransform::PrecipRateToMmPerDay);
        }
        for variable in ["WS2M", "WS10M", "WS10M_MAX"] {
            normalizer.register(variable, UnitTransform::MetersPerSecondToKmPerHour);
        }
        normalizer
    }
}

impl UnitNormalizer {
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    pub fn register(&mut self, variable: impl Into<String>, transform: UnitTransform) -> &mut Self {
        self.transforms.insert(variable.into(), transform);
        self
    }

    pub fn transform_for(&self, variable: &str) -> UnitTransform {
        self.transforms
            .get(variable)
            .copied()
            .unwrap_or(UnitTransform::Identity)
    }

    pub fn normalize(&self, variable: &str, values: &[f64]) -> Vec<f64> {
        let transform = self.transform_for(variable);
        values.iter().map(|v| transform.apply(*v)).collect()
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Below this mean of the simple estimate and the air temperature (°F) the simple
/// estimate is the heat index.
const ROTHFUSZ_MIN_F: f64 = 80.0;

/// Heat index in °C from air temperature (°C) and relative humidity (%), following
/// the NWS procedure in °F.
///
/// Steadman's simple estimate is used first. The Rothfusz regression with its dry
/// and humid adjustments takes over once that estimate averaged with the air
/// temperature reaches 80 °F.
pub fn heat_index(temperature_c: f64, relative_humidity: f64) -> f64 {
    let t = celsius_to_fahrenheit(temperature_c);
    let rh = relative_humidity;

    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    if (simple + t) / 2.0 < ROTHFUSZ_MIN_F {
        return fahrenheit_to_celsius(simple);
    }

    let mut hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 6.837_83e-3 * t * t
        - 5.481_717e-2 * rh * rh
        + 1.228_74e-3 * t * t * rh
        + 8.528_2e-4 * t * rh * rh
        - 1.99e-6 * t * t * rh * rh;

    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= (13.0 - rh) / 4.0 * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += (rh - 85.0) / 10.0 * ((87.0 - t) / 5.0);
    }
    fahrenheit_to_celsius(hi)
}
