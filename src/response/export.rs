//! Rendering query responses as downloadable JSON or CSV files.

use crate::error::ClimateRiskError;
use crate::response::result::QueryResponse;
use chrono::{NaiveDate, Utc};
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// `climate_risk_<MMDD>_<YYYY-MM-DD>` for a query day and export date.
pub fn file_stem(response: &QueryResponse, exported_on: NaiveDate) -> String {
    format!(
        "climate_risk_{}_{}",
        response.query.date_of_year.replace('-', ""),
        exported_on.format("%Y-%m-%d")
    )
}

pub fn to_json(response: &QueryResponse) -> Result<String, ClimateRiskError> {
    serde_json::to_string_pretty(response).map_err(ClimateRiskError::Serialize)
}

fn csv_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One row per condition, then a blank line and `key,value` lines describing the
/// dataset and the query.
pub fn to_csv(response: &QueryResponse) -> Result<String, ClimateRiskError> {
    let results = &response.results;
    let mut df = df!(
        "condition" => results.keys().cloned().collect::<Vec<_>>(),
        "probability_percent" => results.values().map(|r| r.probability_percent).collect::<Vec<_>>(),
        "threshold_value" => results.values().map(|r| r.threshold.value).collect::<Vec<_>>(),
        "threshold_unit" => results.values().map(|r| r.threshold.unit.clone()).collect::<Vec<_>>(),
        "trend" => results.values().map(|r| r.trend.clone()).collect::<Vec<_>>(),
        "historical_values" => results
            .values()
            .map(|r| {
                r.historical_values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .collect::<Vec<_>>()
    )
    .map_err(ClimateRiskError::Export)?;

    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)
        .map_err(ClimateRiskError::Export)?;
    let mut csv = String::from_utf8_lossy(&buffer).into_owned();

    let metadata = &response.metadata;
    let query = &response.query;
    let mut lines = vec![
        String::new(),
        format!("source,{}", csv_field(&metadata.data_source)),
        format!("time_range,{}", csv_field(&metadata.time_range)),
        format!("units,{}", csv_field(&metadata.units)),
        format!("generated_at,{}", csv_field(&metadata.generated_at)),
    ];
    if let Some(window_days) = metadata.window_days {
        lines.push(format!("window_days,{}", window_days));
    }
    if let Some(samples) = metadata.samples {
        lines.push(format!("samples,{}", samples));
    }
    if let Some(point) = metadata.grid_point {
        lines.push(format!("grid_point_lat,{}", point.lat));
        lines.push(format!("grid_point_lon,{}", point.lon));
    }
    lines.push(format!("origin,{}", response.origin));
    lines.push(format!("query_location_lat,{}", query.location.lat));
    lines.push(format!("query_location_lon,{}", query.location.lon));
    lines.push(format!("query_date_of_year,{}", query.date_of_year));

    csv.push_str(&lines.join("\n"));
    csv.push('\n');
    Ok(csv)
}

/// Writes the response into `dir` and returns the file path.
pub async fn save(
    response: &QueryResponse,
    dir: &Path,
    format: ExportFormat,
) -> Result<PathBuf, ClimateRiskError> {
    let contents = match format {
        ExportFormat::Json => to_json(response)?,
        ExportFormat::Csv => to_csv(response)?,
    };
    let path = dir.join(format!(
        "{}.{}",
        file_stem(response, Utc::now().date_naive()),
        format.extension()
    ));
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| ClimateRiskError::ExportIo(path.clone(), e))?;
    info!("Exported query response to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::parse_payload;
    use crate::response::result::{PayloadOrigin, QueryEcho};
    use crate::spatial::grid_point::LatLon;

    fn response() -> QueryResponse {
        let report = parse_payload(include_str!("../../data/mock_response.json")).unwrap();
        QueryResponse::new(
            QueryEcho {
                location: LatLon(39.74, -104.99).into(),
                date_of_year: "07-15".into(),
                conditions: vec!["very_hot".into(), "very_cold".into()],
            },
            report,
            PayloadOrigin::Mock,
        )
    }

    #[test]
    fn test_file_stem() {
        let day = NaiveDate::from_ymd_opt(2025, 10, 4).unwrap();
        assert_eq!(file_stem(&response(), day), "climate_risk_0715_2025-10-04");
    }

    #[test]
    fn test_csv_layout() -> Result<(), ClimateRiskError> {
        let csv = to_csv(&response())?;
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "condition,probability_percent,threshold_value,threshold_unit,trend,historical_values"
        );
        // Five conditions, sorted by name.
        assert!(lines[1].starts_with("very_cold,"));
        let hot = lines.iter().find(|l| l.starts_with("very_hot,")).unwrap();
        assert!(hot.contains("increasing 12.4%"));
        assert!(hot.contains("°C"));
        assert_eq!(lines[6], "");
        assert!(lines.contains(&"source,MERRA-2 (NASA GES DISC) demo sample"));
        assert!(lines.contains(&"origin,mock"));
        assert!(lines.contains(&"query_date_of_year,07-15"));
        assert!(lines.contains(&"samples,168"));
        Ok(())
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_save_json_round_trips() -> Result<(), ClimateRiskError> {
        let tmp = tempfile::tempdir().unwrap();
        let original = response();
        let path = save(&original, tmp.path(), ExportFormat::Json).await?;
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let restored: QueryResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, original);
        Ok(())
    }
}
