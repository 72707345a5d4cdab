//! The fixed set of weather conditions the engine can evaluate.

use std::fmt;

/// Direction of a threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// value ≥ threshold
    AtLeast,
    /// value ≤ threshold
    AtMost,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => value >= threshold,
            Comparison::AtMost => value <= threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::AtLeast => write!(f, ">="),
            Comparison::AtMost => write!(f, "<="),
        }
    }
}

/// How a condition's value is computed when it is not read directly from
/// its source variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Heat index from the source temperature and this relative humidity (%) variable.
    HeatIndex { humidity: &'static str },
}

impl Derivation {
    /// Extra dataset variables the derivation reads.
    pub fn inputs(&self) -> &[&'static str] {
        match self {
            Derivation::HeatIndex { humidity } => std::slice::from_ref(humidity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionSetting {
    pub name: &'static str,
    pub label: &'static str,
    pub source_variable: &'static str,
    pub threshold: f64,
    pub unit: &'static str,
    pub comparison: Comparison,
    pub description: &'static str,
    pub derivation: Option<Derivation>,
}

impl ConditionSetting {
    /// Every dataset variable the condition needs.
    pub fn required_variables(&self) -> Vec<&'static str> {
        let mut variables = vec![self.source_variable];
        if let Some(derivation) = &self.derivation {
            variables.extend_from_slice(derivation.inputs());
        }
        variables
    }
}

pub const CATALOG: [ConditionSetting; 5] = [
    ConditionSetting {
        name: "very_hot",
        label: "Extreme Heat",
        source_variable: "T2MMAX",
        threshold: 32.2,
        unit: "°C",
        comparison: Comparison::AtLeast,
        description: "Daily maximum temperature at or above 32.2 °C (90 °F)",
        derivation: None,
    },
    ConditionSetting {
        name: "very_cold",
        label: "Hard Freeze",
        source_variable: "T2MMIN",
        threshold: 0.0,
        unit: "°C",
        comparison: Comparison::AtMost,
        description: "Daily minimum temperature at or below 0 °C (frost or hard freeze)",
        derivation: None,
    },
    ConditionSetting {
        name: "very_wet",
        label: "Heavy Rain",
        source_variable: "PRECTOTCORR",
        threshold: 25.4,
        unit: "mm/day",
        comparison: Comparison::AtLeast,
        description: "Daily precipitation at or above 25.4 mm (1 inch)",
        derivation: None,
    },
    ConditionSetting {
        name: "very_windy",
        label: "High Winds",
        source_variable: "WS10M_MAX",
        threshold: 40.0,
        unit: "km/h",
        comparison: Comparison::AtLeast,
        description: "Daily peak 10 m wind speed at or above 40 km/h",
        derivation: None,
    },
    ConditionSetting {
        name: "very_uncomfortable",
        label: "Muggy Heat",
        source_variable: "T2MMAX",
        threshold: 40.6,
        unit: "°C",
        comparison: Comparison::AtLeast,
        description: "Heat index at or above 40.6 °C (105 °F), dangerous for outdoor work",
        derivation: Some(Derivation::HeatIndex { humidity: "RH2M" }),
    },
];

pub fn lookup(name: &str) -> Option<&'static ConditionSetting> {
    CATALOG.iter().find(|setting| setting.name == name)
}

/// Every condition name, in catalog order.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|setting| setting.name)
}

/// Display label for a condition, falling back to the raw name.
pub fn label_for(name: &str) -> &str {
    lookup(name).map(|setting| setting.label).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let unique: HashSet<_> = names().collect();
        assert_eq!(unique.len(), CATALOG.len());
    }

    #[test]
    fn test_lookup() {
        let cold = lookup("very_cold").unwrap();
        assert_eq!(cold.comparison, Comparison::AtMost);
        assert!(cold.comparison.holds(0.0, cold.threshold));
        assert!(!cold.comparison.holds(0.1, cold.threshold));
        assert!(lookup("very_sunny").is_none());
        assert_eq!(label_for("very_windy"), "High Winds");
        assert_eq!(label_for("very_sunny"), "very_sunny");
    }

    #[test]
    fn test_heat_index_needs_humidity() {
        let muggy = lookup("very_uncomfortable").unwrap();
        assert_eq!(muggy.required_variables(), vec!["T2MMAX", "RH2M"]);
        assert_eq!(lookup("very_hot").unwrap().required_variables(), vec!["T2MMAX"]);
    }
}
