use climate_risk::{summarize, to_csv, ClimateEngine, ClimateRiskError, FallbackMode, LatLon};

#[tokio::main]
async fn main() -> Result<(), ClimateRiskError> {
    // Without CLIMATE_RISK_DATASET this reads the bundled Denver sample.
    let engine = ClimateEngine::new().await?;

    let response = engine
        .compute_conditions()
        .location(LatLon(39.7392, -104.9903))
        .date_of_year("07-15")
        .conditions(vec![
            "very_hot".to_string(),
            "very_wet".to_string(),
            "very_uncomfortable".to_string(),
        ])
        .mode(FallbackMode::LiveWithFallback)
        .call()
        .await?;

    println!("origin: {}", response.origin);
    for summary in summarize(&response) {
        println!("[{:?}] {} (trend: {})", summary.tier, summary.friendly_message, summary.trend);
    }
    println!();
    println!("{}", to_csv(&response)?);

    engine.close().await;
    Ok(())
}
