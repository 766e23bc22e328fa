//! ConfigLoader facade delegating to the merge service.

use super::merge::MergeService;
use super::SyncConfig;
use crate::error::{SyncError, SyncResult};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `file` (or the XDG default), and environment.
    pub fn load(file: Option<&Path>) -> SyncResult<SyncConfig> {
        let config = MergeService::load(file).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate().map_err(SyncError::Config)?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> SyncConfig {
        SyncConfig::default()
    }
}
