use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{BoundingBox, CleanupPolicy, GridAxis, InitTime, RunParameters};
use crate::error::SrefError;
use crate::nomads::DEFAULT_TIMEOUT_SECS;

pub const CONFIG_FILE_NAME: &str = "sref-fetch.json";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub init_time: Option<InitTime>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub cores: Option<Vec<String>>,
    #[serde(default)]
    pub perts: Option<Vec<String>>,
    #[serde(default)]
    pub cleanup: Option<CleanupPolicy>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub converter: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Command-line values; each one set here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub init_time: Option<InitTime>,
    pub bbox: Option<BoundingBox>,
    pub cores: Option<Vec<String>>,
    pub perts: Option<Vec<String>>,
    pub cleanup: Option<CleanupPolicy>,
    pub base_url: Option<String>,
    pub converter: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source: Option<PathBuf>,
    pub params: RunParameters,
    pub cleanup: CleanupPolicy,
    pub converter: Option<PathBuf>,
    pub timeout_secs: u64,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit `path` must exist. Without one, the first of
    /// `./sref-fetch.json` and the user config file that exists is used,
    /// falling back to built-in defaults.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SrefError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_config_paths().into_iter().find(|path| path.exists()),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default(), overrides);
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SrefError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SrefError::ConfigParse(err.to_string()))?;

        let mut resolved = Self::resolve_config(config, overrides)?;
        resolved.source = Some(config_path);
        Ok(resolved)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SrefError> {
        let defaults = RunParameters::default();

        let cores = match overrides.cores.or(config.cores) {
            Some(members) => GridAxis::new("core", members)?,
            None => defaults.cores,
        };
        let perts = match overrides.perts.or(config.perts) {
            Some(members) => GridAxis::new("pert", members)?,
            None => defaults.perts,
        };

        let params = RunParameters {
            init_time: overrides
                .init_time
                .or(config.init_time)
                .unwrap_or(defaults.init_time),
            bbox: overrides.bbox.or(config.bbox).unwrap_or(defaults.bbox),
            cores,
            perts,
            base_url: overrides
                .base_url
                .or(config.base_url)
                .unwrap_or(defaults.base_url),
        };
        params.validate()?;

        Ok(ResolvedConfig {
            source: None,
            params,
            cleanup: overrides.cleanup.or(config.cleanup).unwrap_or_default(),
            converter: overrides.converter.or(config.converter),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = ProjectDirs::from("", "", "sref-fetch") {
        paths.push(dirs.config_dir().join("config.json"));
    }
    paths
}
