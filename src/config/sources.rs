//! Configuration sources: TOML files and `TREESYNC__*` environment variables.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Environment prefix; nested keys are separated by `__`,
/// e.g. `TREESYNC__TRANSPORT__TIMEOUT_SECS=30`.
pub const ENV_PREFIX: &str = "TREESYNC";

/// Overlay a TOML file. A missing file is an error only when `required`.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        File::from(path)
            .format(FileFormat::Toml)
            .required(required),
    ))
}

/// Overlay environment variables (highest precedence).
pub fn add_environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
