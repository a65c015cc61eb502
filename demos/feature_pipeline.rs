//! Fetches the last `DAYS_HISTORY` days of pollutants and weather, builds the
//! feature table and stores it.
//!
//! `RUST_LOG=info cargo run --example feature_pipeline`

use aqi_forecast::{AqiError, FeaturePipeline, PipelineConfig};
use std::env;

#[tokio::main]
async fn main() -> Result<(), AqiError> {
    pretty_env_logger::init();
    env::set_var("POLARS_FMT_MAX_COLS", "-1");

    let config = PipelineConfig::from_env()?;
    let report = FeaturePipeline::new(config).run().await?;

    if let Some(e) = &report.weather_error {
        println!("Built without weather: {e}");
    }
    if let Some(e) = report.stored.remote_error() {
        println!("Stored locally instead of remotely: {e}");
    }
    println!("{} feature rows", report.rows());
    println!("{}", report.features.tail(5).frame);
    Ok(())
}
