//! Dataset cache and engine critical section.
//!
//! The analysis engine is one shared, non-reentrant resource for the whole
//! process: a dataset load clobbers the engine's current-object reference, so
//! no two engine calls may ever interleave, even across different datasets.
//! One mutex therefore guards the engine and the path-to-handle map together;
//! the map is only ever touched inside that critical section. Loaded handles
//! are immutable and live until an explicit [DatasetCache::clear].

use crate::dataset::Dataset;
use crate::engine::{AnalysisEngine, EngineError};
use crate::error::ExpressionQueryError;
use crate::metrics;

use hashbrown::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::debug;

/// An immutable reference to a loaded dataset.
#[derive(Clone, Debug)]
pub struct DatasetHandle {
    /// Source path, the cache key.
    pub path: PathBuf,
    /// The loaded dataset.
    pub dataset: Arc<Dataset>,
    /// When the load completed.
    pub loaded_at: SystemTime,
}

struct CacheInner {
    engine: Box<dyn AnalysisEngine>,
    datasets: HashMap<PathBuf, DatasetHandle>,
}

/// Maps dataset paths to loaded handles and serializes all engine access.
pub struct DatasetCache {
    inner: Mutex<CacheInner>,
}

impl DatasetCache {
    /// Return a cache owning the process's engine instance.
    pub fn new(engine: Box<dyn AnalysisEngine>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                engine,
                datasets: HashMap::new(),
            }),
        }
    }

    /// Run `query` against the dataset at `path` inside the critical section.
    ///
    /// A cache miss initializes the engine and loads the dataset first, still
    /// inside the same section, so concurrent misses for one path perform
    /// exactly one load and a half-loaded handle is never observable. A
    /// failed load is propagated and caches nothing.
    pub async fn with_dataset<T>(
        &self,
        operation: &'static str,
        path: &Path,
        query: impl FnOnce(&mut dyn AnalysisEngine, &DatasetHandle) -> Result<T, EngineError>,
    ) -> Result<T, ExpressionQueryError> {
        let mut inner = self.inner.lock().await;
        let _timer = metrics::ENGINE_SECTION_TIME
            .with_label_values(&[operation])
            .start_timer();
        let inner = &mut *inner;

        let handle = if let Some(handle) = inner.datasets.get(path).cloned() {
            metrics::DATASET_CACHE_HITS.inc();
            handle
        } else {
            metrics::DATASET_CACHE_MISSES.inc();
            debug!(path = %path.display(), "dataset not cached, loading");
            let load = |engine: &mut dyn AnalysisEngine| -> Result<Arc<Dataset>, EngineError> {
                engine.initialize()?;
                engine.load_dataset(path)
            };
            let dataset =
                load(inner.engine.as_mut()).map_err(|source| ExpressionQueryError::DatasetLoad {
                    path: path.to_path_buf(),
                    source,
                })?;
            let handle = DatasetHandle {
                path: path.to_path_buf(),
                dataset,
                loaded_at: SystemTime::now(),
            };
            inner.datasets.insert(path.to_path_buf(), handle.clone());
            handle
        };

        query(inner.engine.as_mut(), &handle).map_err(ExpressionQueryError::from)
    }

    /// Return the handle for `path`, loading the dataset on a miss.
    pub async fn get(&self, path: &Path) -> Result<DatasetHandle, ExpressionQueryError> {
        self.with_dataset("get", path, |_, handle| Ok(handle.clone()))
            .await
    }

    /// Drop every entry; subsequent gets re-load from disk.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let dropped = inner.datasets.len();
        inner.datasets.clear();
        debug!(dropped, "dataset cache cleared");
    }

    /// Number of cached datasets.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.datasets.len()
    }
}
