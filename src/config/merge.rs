//! MergeService: layers sources over defaults and deserializes into `SyncConfig`.

use super::paths::default_config_file;
use super::sources;
use super::{
    default_listen, default_poll_interval_ms, default_root, default_timeout_secs, SyncConfig,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use std::path::Path;

pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> config file -> environment (highest).
    ///
    /// With no explicit `file`, the XDG config file is used when it exists.
    pub fn load(file: Option<&Path>) -> Result<SyncConfig, ConfigError> {
        let builder = Self::builder_with_defaults()?;
        let builder = match file {
            Some(path) => sources::add_file(builder, path, true)?,
            None => match default_config_file() {
                Some(path) => sources::add_file(builder, &path, false)?,
                None => builder,
            },
        };
        let builder = sources::add_environment(builder)?;
        builder.build()?.try_deserialize()
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("root", default_root().to_string_lossy().into_owned())?
            .set_default("listen", default_listen())?
            .set_default("transport.timeout_secs", default_timeout_secs() as i64)?
            .set_default("reconcile.compare_content", false)?
            .set_default("watch.poll_interval_ms", default_poll_interval_ms() as i64)
    }
}
