//! Short plain-language readings of a response, one per condition.

use crate::conditions::catalog::label_for;
use crate::response::result::QueryResponse;
use serde::{Deserialize, Serialize};

/// At or above this probability a condition is a high risk.
pub const HIGH_RISK_PERCENT: f64 = 40.0;
/// At or above this probability a condition is a medium risk.
pub const MEDIUM_RISK_PERCENT: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    pub fn from_probability(percent: f64) -> Self {
        if percent >= HIGH_RISK_PERCENT {
            RiskTier::High
        } else if percent >= MEDIUM_RISK_PERCENT {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    fn message(&self, label: &str, percent: f64) -> String {
        match self {
            RiskTier::High => format!(
                "{}% odds of {} for this date window. Build contingencies.",
                percent,
                label.to_lowercase()
            ),
            RiskTier::Medium => format!(
                "{} shows up about {}% of the time across the record.",
                label, percent
            ),
            RiskTier::Low => format!("{} is historically uncommon here (~{}%).", label, percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub condition: String,
    pub label: String,
    pub probability: f64,
    pub tier: RiskTier,
    pub friendly_message: String,
    pub trend: String,
}

/// Summaries for every result that carries a probability.
pub fn summarize(response: &QueryResponse) -> Vec<ConditionSummary> {
    response
        .results
        .iter()
        .filter_map(|(name, result)| {
            let probability = result.probability_percent?;
            let label = label_for(name).to_string();
            let tier = RiskTier::from_probability(probability);
            Some(ConditionSummary {
                condition: name.clone(),
                friendly_message: tier.message(&label, probability),
                label,
                probability,
                tier,
                trend: result.trend.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::parse_payload;
    use crate::response::result::{PayloadOrigin, QueryEcho};
    use crate::spatial::grid_point::LatLon;

    fn bundled_response() -> QueryResponse {
        let report = parse_payload(include_str!("../../data/mock_response.json")).unwrap();
        QueryResponse::new(
            QueryEcho {
                location: LatLon(39.74, -104.99).into(),
                date_of_year: "07-15".into(),
                conditions: report.results.keys().cloned().collect(),
            },
            report,
            PayloadOrigin::Mock,
        )
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_probability(40.0), RiskTier::High);
        assert_eq!(RiskTier::from_probability(39.9), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(15.0), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(14.9), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.0), RiskTier::Low);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            RiskTier::High.message("Extreme Heat", 52.5),
            "52.5% odds of extreme heat for this date window. Build contingencies."
        );
        assert_eq!(
            RiskTier::Medium.message("Heavy Rain", 18.0),
            "Heavy Rain shows up about 18% of the time across the record."
        );
        assert_eq!(
            RiskTier::Low.message("High Winds", 3.3),
            "High Winds is historically uncommon here (~3.3%)."
        );
    }

    #[test]
    fn test_summarize_bundled_payload() {
        let mut response = bundled_response();
        response
            .results
            .get_mut("very_windy")
            .unwrap()
            .probability_percent = None;

        let summaries = summarize(&response);
        assert_eq!(summaries.len(), 4);
        let hot = summaries.iter().find(|s| s.condition == "very_hot").unwrap();
        assert_eq!(hot.label, "Extreme Heat");
        assert_eq!(hot.probability, 18.0);
        assert_eq!(hot.tier, RiskTier::Medium);
        assert_eq!(hot.trend, "increasing 12.4%");
    }
}
