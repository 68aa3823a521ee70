//! Store configuration.

use std::path::PathBuf;

use crate::storage::index::StageMode;

/// default store directory, relative to the working directory
pub const DEFAULT_STORE_DIR: &str = ".snap";

/// Store configuration options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the store directory.
    pub root: PathBuf,
    /// Initialize the store if it doesn't exist yet.
    pub create_if_missing: bool,
    /// How staging treats a path that is already staged.
    pub stage_mode: StageMode,
    /// Upper bound on commits yielded by a history walk.
    pub max_history_depth: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_DIR),
            create_if_missing: true,
            stage_mode: StageMode::Append,
            max_history_depth: None,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with the given path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set the staging mode.
    pub fn stage_mode(mut self, mode: StageMode) -> Self {
        self.stage_mode = mode;
        self
    }

    /// Cap history walks at `depth` commits.
    pub fn max_history_depth(mut self, depth: usize) -> Self {
        self.max_history_depth = Some(depth);
        self
    }
}
