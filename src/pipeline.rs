//! End-to-end runs: fetch and featurize, then train and register.

use crate::config::{history_start, PipelineConfig};
use crate::error::AqiError;
use crate::features::aggregate::aggregate_pollutants;
use crate::features::build::FeatureBuilder;
use crate::sources::error::SourceError;
use crate::sources::open_meteo::OpenMeteoClient;
use crate::store::error::StoreError;
use crate::store::feature_store::{FeatureStore, LocalFeatureStore};
use crate::store::model_registry::{LocalModelRegistry, ModelRegistry};
use crate::store::tiered::{NoRemote, StorageMode, StoreOutcome, Tiered};
use crate::training::error::TrainingError;
use crate::training::metrics::Metrics;
use crate::training::trainer::train_horizon;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::frames::weather_frame::WeatherFrame;
use crate::types::horizon::Horizon;
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use std::collections::BTreeMap;

/// What a [`FeaturePipeline`] run produced.
#[derive(Debug)]
pub struct FeatureRunReport {
    pub features: FeatureFrame,
    /// Weather observations that were available for the join.
    pub weather_rows: usize,
    /// Why the run went ahead without weather, if it did.
    pub weather_error: Option<AqiError>,
    /// Which store tier ended up holding the table.
    pub stored: StoreOutcome<()>,
}

impl FeatureRunReport {
    pub fn rows(&self) -> usize {
        self.features.height()
    }
}

/// Fetch, aggregate, enrich, build and persist the feature table.
///
/// ```no_run
/// use aqi_forecast::{FeaturePipeline, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = FeaturePipeline::new(PipelineConfig::from_env()?).run().await?;
/// println!("{} feature rows", report.rows());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeaturePipeline<R = NoRemote> {
    config: PipelineConfig,
    client: OpenMeteoClient,
    builder: FeatureBuilder,
    store: Tiered<LocalFeatureStore, R>,
}

impl FeaturePipeline<NoRemote> {
    pub fn new(config: PipelineConfig) -> Self {
        warn_if_remote_unset(&config);
        let client = OpenMeteoClient::with_urls(&config.air_quality_url, &config.weather_url);
        let builder = match config.max_join_distance {
            Some(distance) => FeatureBuilder::new().with_max_join_distance(distance),
            None => FeatureBuilder::new(),
        };
        let store = Tiered::new(
            LocalFeatureStore::new(&config.feature_path),
            NoRemote,
            config.storage_mode,
        );
        Self {
            config,
            client,
            builder,
            store,
        }
    }
}

impl<R: FeatureStore> FeaturePipeline<R> {
    /// Uses `remote` as the remote tier of the feature store.
    pub fn with_remote<S: FeatureStore>(self, remote: S) -> FeaturePipeline<S> {
        let local = self.store.local().clone();
        FeaturePipeline {
            store: Tiered::new(local, remote, self.config.storage_mode),
            config: self.config,
            client: self.client,
            builder: self.builder,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Tiered<LocalFeatureStore, R> {
        &self.store
    }

    /// Runs the pipeline once.
    ///
    /// Pollutant history covers the last `days_history` days. Weather is
    /// fetched for the days the pollutant data spans; if that fails the table
    /// is built without weather and the reason is kept in the report.
    ///
    /// # Errors
    ///
    /// * [`AqiError::Config`] when `days_history` reaches before the earliest
    ///   representable date.
    /// * [`AqiError::NoPollutantData`] when the air-quality endpoint returns no hours.
    /// * [`AqiError::Source`] for any other air-quality fetch failure.
    /// * [`AqiError::Feature`] / [`AqiError::Store`] when building or storing fails.
    pub async fn run(&self) -> Result<FeatureRunReport, AqiError> {
        info!("Starting feature pipeline for {}", self.config.city);
        let end = Utc::now().date_naive();
        let start = history_start(end, self.config.days_history)?;

        let raw = match self
            .client
            .air_quality()
            .location(self.config.location)
            .start(start)
            .end(end)
            .call()
            .await
        {
            Ok(raw) => raw,
            Err(SourceError::MissingHourly(_)) => {
                return Err(AqiError::NoPollutantData(self.config.city.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let pollutants = aggregate_pollutants(raw)?;
        if pollutants.is_empty() {
            return Err(AqiError::NoPollutantData(self.config.city.clone()));
        }
        info!("Aggregated {} pollutant hours", pollutants.height());

        let (weather_start, weather_end) = pollutants
            .time_span()?
            .map(|(first, last)| (first.date(), last.date()))
            .unwrap_or((start, end));
        let (weather, weather_error) = match self.fetch_weather(weather_start, weather_end).await {
            Ok(weather) => (weather, None),
            Err(e) => {
                warn!("Could not fetch weather data, continuing without it: {}", e);
                (WeatherFrame::empty(), Some(e))
            }
        };

        let features = self.builder.build(&pollutants, Some(&weather))?;
        let stored = self.store.insert(&features)?;
        info!(
            "Feature pipeline for {} finished with {} rows",
            self.config.city,
            features.height()
        );

        Ok(FeatureRunReport {
            weather_rows: weather.height(),
            features,
            weather_error,
            stored,
        })
    }

    async fn fetch_weather(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherFrame, AqiError> {
        let raw = self
            .client
            .weather()
            .location(self.config.location)
            .start(start)
            .end(end)
            .call()
            .await?;
        Ok(WeatherFrame::from_raw(raw)?)
    }
}

/// What a [`TrainingPipeline`] run produced.
#[derive(Debug, Default)]
pub struct TrainingReport {
    /// Held-out scores of every model that was trained and saved.
    pub metrics: BTreeMap<Horizon, Metrics>,
    /// Horizons without enough data, with the reason.
    pub skipped: Vec<(Horizon, TrainingError)>,
    /// Remote failures the local tiers covered for.
    pub remote_errors: Vec<StoreError>,
}

/// Read the feature table, train one model per horizon and register them.
///
/// ```no_run
/// use aqi_forecast::{PipelineConfig, TrainingPipeline};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = TrainingPipeline::new(PipelineConfig::from_env()?).run()?;
/// for (horizon, metrics) in &report.metrics {
///     println!("{horizon}: {metrics}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TrainingPipeline<FR = NoRemote, MR = NoRemote> {
    config: PipelineConfig,
    features: Tiered<LocalFeatureStore, FR>,
    registry: Tiered<LocalModelRegistry, MR>,
}

impl TrainingPipeline<NoRemote, NoRemote> {
    pub fn new(config: PipelineConfig) -> Self {
        warn_if_remote_unset(&config);
        let features = Tiered::new(
            LocalFeatureStore::new(&config.feature_path),
            NoRemote,
            config.storage_mode,
        );
        let registry = Tiered::new(
            LocalModelRegistry::new(&config.models_dir),
            NoRemote,
            config.storage_mode,
        );
        Self {
            config,
            features,
            registry,
        }
    }
}

impl<FR: FeatureStore, MR: ModelRegistry> TrainingPipeline<FR, MR> {
    /// Uses `features` and `registry` as the remote tiers.
    pub fn with_remotes<F: FeatureStore, M: ModelRegistry>(
        self,
        features: F,
        registry: M,
    ) -> TrainingPipeline<F, M> {
        let mode = self.config.storage_mode;
        TrainingPipeline {
            features: Tiered::new(self.features.local().clone(), features, mode),
            registry: Tiered::new(self.registry.local().clone(), registry, mode),
            config: self.config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Tiered<LocalModelRegistry, MR> {
        &self.registry
    }

    /// Trains every horizon on the stored feature table.
    ///
    /// Horizons without a target column or with too few labelled rows are
    /// skipped and listed in [`TrainingReport::skipped`].
    ///
    /// # Errors
    ///
    /// Reading the table, saving a model, or an unexpected training failure.
    pub fn run(&self) -> Result<TrainingReport, AqiError> {
        let mut report = TrainingReport::default();

        let (frame, remote_error) = self.features.read()?.into_parts();
        report.remote_errors.extend(remote_error);
        info!("Training on {} feature rows", frame.height());

        for horizon in Horizon::ALL {
            let artifact = match train_horizon(&frame, horizon, &self.config.forest) {
                Ok(artifact) => artifact,
                Err(
                    e @ (TrainingError::MissingTarget(_)
                    | TrainingError::EmptyTrainingSet { .. }
                    | TrainingError::InsufficientSamples { .. }),
                ) => {
                    warn!("Skipping {}: {}", horizon, e);
                    report.skipped.push((horizon, e));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let ((), remote_error) = self.registry.save(&artifact)?.into_parts();
            report.remote_errors.extend(remote_error);
            report.metrics.insert(horizon, artifact.metrics);
        }

        Ok(report)
    }
}

fn warn_if_remote_unset(config: &PipelineConfig) {
    if config.storage_mode == StorageMode::Remote && config.remote.is_none() {
        warn!("Remote storage selected but no credentials are set; using local storage");
    }
}
