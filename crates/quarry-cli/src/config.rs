//! Application configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Config file looked up when none is given explicitly (any supported extension)
pub const DEFAULT_CONFIG_FILE: &str = "config/quarry";

/// Prefix of environment overrides, e.g. `QUARRY_SOURCES_PATH`
pub const ENV_PREFIX: &str = "QUARRY";

/// Settings for the `quarry` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// YAML file with the `sources:` mapping loaded at startup
    pub sources_path: PathBuf,

    /// Directory charts are written to when no output file is given
    pub chart_output_dir: PathBuf,

    /// Default level for the quarry crates when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources_path: PathBuf::from("./sources.yaml"),
            chart_output_dir: PathBuf::from("./output/charts"),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load from `.env`, the config file and `QUARRY_*` environment variables
    ///
    /// An explicit `file` must exist; the default file is optional.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::build(file, None)
    }

    /// Same as [`AppConfig::load`] but with an explicit environment map
    /// instead of the process environment (`None` reads the process)
    pub fn build(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize config: {}", e))
    }
}
