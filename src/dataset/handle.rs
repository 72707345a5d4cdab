use crate::dataset::dataset_ref::DatasetRef;
use crate::dataset::error::DatasetError;
use crate::dataset::loader::{DatasetLoader, DatasetLocator};
use crate::error::ClimateRiskError;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

/// File name of the sample dataset shipped in the crate's `data/` directory.
pub const BUNDLED_SAMPLE: &str = "sample_denver_2018_2023.csv";

pub fn bundled_sample_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("data")
        .join(BUNDLED_SAMPLE)
}

/// Owns the currently open dataset.
///
/// Opening is idempotent per locator and serialised: the lock is held for the
/// whole physical open, so concurrent callers share one [`DatasetRef`].
pub struct DatasetHandle {
    default_locator: Option<String>,
    bundled_sample: PathBuf,
    loader: DatasetLoader,
    current: Mutex<Option<Arc<DatasetRef>>>,
}

impl DatasetHandle {
    pub fn new(default_locator: Option<String>, cache_dir: &Path) -> Self {
        Self {
            default_locator: default_locator.filter(|l| !l.trim().is_empty()),
            bundled_sample: bundled_sample_path(),
            loader: DatasetLoader::new(cache_dir),
            current: Mutex::new(None),
        }
    }

    /// Overrides the dataset used when no locator is given or configured.
    pub fn with_bundled_sample(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled_sample = path.into();
        self
    }

    /// Explicit locator, else the configured default, else the bundled sample.
    fn resolve_locator(&self, explicit: Option<&str>) -> Result<String, DatasetError> {
        let provided = explicit
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_locator.clone());
        if let Some(locator) = provided {
            return Ok(locator);
        }
        if self.bundled_sample.is_file() {
            Ok(self.bundled_sample.to_string_lossy().into_owned())
        } else {
            Err(DatasetError::NoLocator(self.bundled_sample.clone()))
        }
    }

    /// Opens the dataset named by `explicit` (or the fallback chain), reusing the
    /// cached reference when it was opened from the same locator.
    ///
    /// A locator that was provided but cannot be opened is an error; the bundled
    /// sample is only used when nothing was provided.
    pub async fn open(&self, explicit: Option<&str>) -> Result<Arc<DatasetRef>, ClimateRiskError> {
        let locator = self.resolve_locator(explicit)?;
        let mut current = self.current.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.locator() == locator {
                return Ok(Arc::clone(existing));
            }
            info!(
                "Replacing open dataset '{}' with '{}'",
                existing.locator(),
                locator
            );
        }

        let parsed = DatasetLocator::parse(&locator);
        let frame = self.loader.get_frame(&parsed).await?;
        let name = parsed.stem();
        let dataset = task::spawn_blocking(move || {
            DatasetRef::from_frame(locator.clone(), name, frame)
                .map_err(|source| DatasetError::Inspect { locator, source })
        })
        .await??;

        let dataset = Arc::new(dataset);
        *current = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Drops the cached reference. In-flight queries keep their own `Arc`.
    pub async fn close(&self) {
        if let Some(dataset) = self.current.lock().await.take() {
            info!("Closed dataset '{}'", dataset.locator());
        }
    }

    pub async fn is_open(&self) -> bool {
        self.current.lock().await.is_some()
    }
}
