use crate::cache::DatasetCache;
use crate::cli::CommandLineArgs;
use crate::dataset::DATASET_FILE;
use crate::engine::local::LocalEngine;

use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Dataset cache owning the engine instance.
    pub cache: DatasetCache,
}

impl AppState {
    /// Create and return an [AppState].
    pub fn new(args: &CommandLineArgs) -> Self {
        Self {
            args: args.clone(),
            cache: DatasetCache::new(Box::new(LocalEngine::new())),
        }
    }

    /// Root directory holding one sub-directory per bioproject.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.args.data_dir)
    }

    /// Directory published plot images are moved into.
    pub fn plot_dir(&self) -> PathBuf {
        PathBuf::from(&self.args.plot_dir)
    }

    /// Path of the serialized dataset for a bioproject.
    pub fn dataset_path(&self, bioproject: &str) -> PathBuf {
        self.data_dir().join(bioproject).join(DATASET_FILE)
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
