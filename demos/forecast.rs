//! Predicts the AQI for the next three days from the latest feature row.
//!
//! Run `feature_pipeline` and `train_models` first.

use aqi_forecast::{
    AqiError, FeatureStore, Forecaster, Horizon, LocalFeatureStore, LocalModelRegistry,
    PipelineConfig,
};

fn main() -> Result<(), AqiError> {
    pretty_env_logger::init();
    let config = PipelineConfig::from_env()?;

    let features = LocalFeatureStore::new(&config.feature_path).read()?;
    let forecaster =
        Forecaster::from_registry(&LocalModelRegistry::new(&config.models_dir), &Horizon::ALL)?;
    if forecaster.horizons().is_empty() {
        println!("No trained models in {}", config.models_dir.display());
        return Ok(());
    }

    let latest = features.tail(1);
    println!("AQI forecast for {}", config.city);
    for forecast in forecaster.predict_all(&latest)? {
        let Some(aqi) = forecast.latest() else {
            continue;
        };
        let category = forecast
            .latest_category()
            .map(|c| c.label())
            .unwrap_or("Unknown");
        println!("  {}: {:.0} ({})", forecast.horizon, aqi, category);
        for (name, importance) in forecast.top_features(3) {
            println!("      {name:<20} {importance:.3}");
        }
    }
    Ok(())
}
