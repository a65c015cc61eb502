//! Trains the day 1..3 models on the stored feature table.
//!
//! `RUST_LOG=info cargo run --example train_models`

use aqi_forecast::{AqiError, PipelineConfig, TrainingPipeline};

fn main() -> Result<(), AqiError> {
    pretty_env_logger::init();

    let report = TrainingPipeline::new(PipelineConfig::from_env()?).run()?;
    for (horizon, metrics) in &report.metrics {
        println!("{horizon}: {metrics}");
    }
    for (horizon, reason) in &report.skipped {
        println!("{horizon}: skipped ({reason})");
    }
    Ok(())
}
