//! Error types and load result structures for the configuration store.

use std::path::PathBuf;

/// Errors raised by a [`ConfigStore`](crate::store::ConfigStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The backing store could not serve the request.
    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of loading a single config file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    /// Every document in the file was loaded.
    Loaded { configs: usize },
    /// File was skipped (dotfile, non-YAML, etc.).
    Skipped { reason: String },
    Failed { error: String },
}
