//! Two-tier repositories: a remote tier selected by configuration, backed by
//! a local tier that takes over when the remote one fails.

use crate::store::error::StoreError;
use crate::store::feature_store::FeatureStore;
use crate::store::model_registry::ModelRegistry;
use crate::training::trainer::{ModelArtifact, ModelMetadata};
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::horizon::Horizon;
use log::warn;
use serde::{Deserialize, Serialize};

/// Which tier a [`Tiered`] repository talks to first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageMode {
    /// Only the local tier is used.
    #[default]
    Local,
    /// The remote tier is used, with the local tier as fallback.
    Remote,
}

/// Where a [`Tiered`] operation was served from.
#[derive(Debug)]
pub enum StoreOutcome<T> {
    Local(T),
    Remote(T),
    /// The remote tier failed and the local tier served the request.
    LocalFallback { value: T, remote_error: StoreError },
}

impl<T> StoreOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            StoreOutcome::Local(v) | StoreOutcome::Remote(v) => v,
            StoreOutcome::LocalFallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StoreOutcome::Local(v) | StoreOutcome::Remote(v) => v,
            StoreOutcome::LocalFallback { value, .. } => value,
        }
    }

    /// The remote failure, if the local tier had to take over.
    pub fn remote_error(&self) -> Option<&StoreError> {
        match self {
            StoreOutcome::LocalFallback { remote_error, .. } => Some(remote_error),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.remote_error().is_some()
    }

    /// Splits the outcome into the value and the remote failure, if any.
    pub fn into_parts(self) -> (T, Option<StoreError>) {
        match self {
            StoreOutcome::Local(v) | StoreOutcome::Remote(v) => (v, None),
            StoreOutcome::LocalFallback {
                value,
                remote_error,
            } => (value, Some(remote_error)),
        }
    }
}

/// Placeholder remote tier for deployments without one.
///
/// Every operation fails with [`StoreError::RemoteNotConfigured`], so a
/// [`Tiered`] repository in [`StorageMode::Remote`] reports a fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemote;

impl FeatureStore for NoRemote {
    fn insert(&self, _features: &FeatureFrame) -> Result<(), StoreError> {
        Err(StoreError::RemoteNotConfigured)
    }

    fn read(&self) -> Result<FeatureFrame, StoreError> {
        Err(StoreError::RemoteNotConfigured)
    }
}

impl ModelRegistry for NoRemote {
    fn save(&self, _artifact: &ModelArtifact) -> Result<(), StoreError> {
        Err(StoreError::RemoteNotConfigured)
    }

    fn load(&self, _horizon: Horizon) -> Result<ModelArtifact, StoreError> {
        Err(StoreError::RemoteNotConfigured)
    }

    fn metadata(&self, _horizon: Horizon) -> Result<ModelMetadata, StoreError> {
        Err(StoreError::RemoteNotConfigured)
    }
}

/// A repository with a local tier `L` and a remote tier `R`.
///
/// In [`StorageMode::Local`] only `L` is touched. In [`StorageMode::Remote`]
/// the request goes to `R`; if that fails the request is repeated against `L`
/// and the remote error is handed back in [`StoreOutcome::LocalFallback`].
/// An error is returned only when the tier that was supposed to answer last
/// fails.
///
/// ```no_run
/// use aqi_forecast::{LocalFeatureStore, NoRemote, StorageMode, Tiered};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let local = LocalFeatureStore::new("data/features.csv");
/// let store = Tiered::new(local, NoRemote, StorageMode::Remote);
/// let outcome = store.read()?;
/// if let Some(e) = outcome.remote_error() {
///     eprintln!("remote unavailable: {e}");
/// }
/// let features = outcome.into_value();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Tiered<L, R = NoRemote> {
    local: L,
    remote: R,
    mode: StorageMode,
}

impl<L> Tiered<L, NoRemote> {
    pub fn local_only(local: L) -> Self {
        Self::new(local, NoRemote, StorageMode::Local)
    }
}

impl<L, R> Tiered<L, R> {
    pub fn new(local: L, remote: R, mode: StorageMode) -> Self {
        Self {
            local,
            remote,
            mode,
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn route<T>(
        &self,
        operation: &str,
        remote: impl FnOnce(&R) -> Result<T, StoreError>,
        local: impl FnOnce(&L) -> Result<T, StoreError>,
    ) -> Result<StoreOutcome<T>, StoreError> {
        match self.mode {
            StorageMode::Local => local(&self.local).map(StoreOutcome::Local),
            StorageMode::Remote => match remote(&self.remote) {
                Ok(value) => Ok(StoreOutcome::Remote(value)),
                Err(remote_error) => {
                    warn!(
                        "Remote {} failed ({}), using the local tier",
                        operation, remote_error
                    );
                    let value = local(&self.local)?;
                    Ok(StoreOutcome::LocalFallback {
                        value,
                        remote_error,
                    })
                }
            },
        }
    }
}

impl<L: FeatureStore, R: FeatureStore> Tiered<L, R> {
    pub fn insert(&self, features: &FeatureFrame) -> Result<StoreOutcome<()>, StoreError> {
        self.route("feature insert", |r| r.insert(features), |l| l.insert(features))
    }

    pub fn read(&self) -> Result<StoreOutcome<FeatureFrame>, StoreError> {
        self.route("feature read", |r| r.read(), |l| l.read())
    }
}

impl<L: ModelRegistry, R: ModelRegistry> Tiered<L, R> {
    pub fn save(&self, artifact: &ModelArtifact) -> Result<StoreOutcome<()>, StoreError> {
        self.route("model save", |r| r.save(artifact), |l| l.save(artifact))
    }

    pub fn load(&self, horizon: Horizon) -> Result<StoreOutcome<ModelArtifact>, StoreError> {
        self.route("model load", |r| r.load(horizon), |l| l.load(horizon))
    }

    pub fn metadata(&self, horizon: Horizon) -> Result<StoreOutcome<ModelMetadata>, StoreError> {
        self.route("metadata read", |r| r.metadata(horizon), |l| l.metadata(horizon))
    }
}

/// A tiered registry can stand in wherever a plain one is expected; the tier
/// that answered is dropped.
impl<L: ModelRegistry, R: ModelRegistry> ModelRegistry for Tiered<L, R> {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), StoreError> {
        Tiered::save(self, artifact).map(StoreOutcome::into_value)
    }

    fn load(&self, horizon: Horizon) -> Result<ModelArtifact, StoreError> {
        Tiered::load(self, horizon).map(StoreOutcome::into_value)
    }

    fn metadata(&self, horizon: Horizon) -> Result<ModelMetadata, StoreError> {
        Tiered::metadata(self, horizon).map(StoreOutcome::into_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::feature_store::LocalFeatureStore;
    use crate::training::trainer::tests::cyclic_features;
    use std::cell::RefCell;

    /// In-memory remote tier that can be told to fail.
    #[derive(Default)]
    struct MemoryRemote {
        fail: bool,
        stored: RefCell<Option<FeatureFrame>>,
    }

    impl FeatureStore for MemoryRemote {
        fn insert(&self, features: &FeatureFrame) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Remote(
                    "memory".into(),
                    "connection refused".into(),
                ));
            }
            *self.stored.borrow_mut() = Some(features.clone());
            Ok(())
        }

        fn read(&self) -> Result<FeatureFrame, StoreError> {
            self.stored
                .borrow()
                .clone()
                .ok_or(StoreError::RemoteNotConfigured)
        }
    }

    #[test]
    fn test_local_mode_never_touches_remote() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Tiered::new(
            LocalFeatureStore::new(dir.path().join("f.csv")),
            MemoryRemote::default(),
            StorageMode::Local,
        );
        let outcome = store.insert(&cyclic_features(5)?)?;
        assert!(matches!(outcome, StoreOutcome::Local(())));
        assert!(store.remote().stored.borrow().is_none());
        Ok(())
    }

    #[test]
    fn test_remote_success() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let local_path = dir.path().join("f.csv");
        let store = Tiered::new(
            LocalFeatureStore::new(&local_path),
            MemoryRemote::default(),
            StorageMode::Remote,
        );
        let outcome = store.insert(&cyclic_features(5)?)?;
        assert!(matches!(outcome, StoreOutcome::Remote(())));
        assert!(!local_path.exists());
        assert_eq!(store.read()?.into_value().height(), 5);
        Ok(())
    }

    #[test]
    fn test_remote_failure_falls_back_with_typed_error() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let local_path = dir.path().join("f.csv");
        let store = Tiered::new(
            LocalFeatureStore::new(&local_path),
            MemoryRemote {
                fail: true,
                ..Default::default()
            },
            StorageMode::Remote,
        );
        let outcome = store.insert(&cyclic_features(5)?)?;
        assert!(outcome.is_fallback());
        assert!(matches!(
            outcome.remote_error(),
            Some(StoreError::Remote(name, _)) if name == "memory"
        ));
        assert!(local_path.exists());
        Ok(())
    }

    #[test]
    fn test_unconfigured_remote_reports_fallback() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = Tiered::new(
            LocalFeatureStore::new(dir.path().join("f.csv")),
            NoRemote,
            StorageMode::Remote,
        );
        store.insert(&cyclic_features(3)?)?;
        let outcome = store.read()?;
        assert!(matches!(
            outcome.remote_error(),
            Some(StoreError::RemoteNotConfigured)
        ));
        assert_eq!(outcome.value().height(), 3);
        Ok(())
    }

    #[test]
    fn test_local_failure_is_an_error() {
        let store = Tiered::local_only(LocalFeatureStore::new("missing/f.csv"));
        assert!(matches!(store.read(), Err(StoreError::FileNotFound(_))));
    }
}
