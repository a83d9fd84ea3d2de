use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next as dirs;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_IMAGE: &str = "public.ecr.aws/privado/privado-core:latest";
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
pub const RESULTS_PATH_SUFFIX: &str = ".privado/privado.json";
pub const RESULTS_URL_MESSAGE: &str = "> Continue to view results on:";
pub const ACCESS_KEY_ENV: &str = "PRIVADO_DOCKER_ACCESS_KEY";
pub const REPOSITORY_URL: &str = "https://github.com/Privado-Inc/privado-cli";

/// Persistent operator settings stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync_to_cloud: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self { sync_to_cloud: false, metrics_enabled: true, image: None, grace_period_secs: None }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), AppError> {
        let path = config_file_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = fs::File::create(path)?;
        let contents = toml::to_string_pretty(self)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }
}

/// Paths inside the scanning container. These are part of the engine's contract.
#[derive(Debug, Clone)]
pub struct ContainerPaths {
    pub source_code_dir: String,
    pub internal_rules_dir: String,
    pub external_rules_dir: String,
    pub user_config_file: String,
    pub user_key_file: String,
}

impl Default for ContainerPaths {
    fn default() -> Self {
        Self {
            source_code_dir: "/app/code".to_string(),
            internal_rules_dir: "/app/rules".to_string(),
            external_rules_dir: "/app/external-rules".to_string(),
            user_config_file: "/app/config/config.json".to_string(),
            user_key_file: "/app/keys/user.key".to_string(),
        }
    }
}

/// A host cache directory shared with the container across scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCache {
    pub host_dir: PathBuf,
    pub container_dir: String,
}

/// Resolved runtime configuration handed to the scan command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub image: String,
    pub container: ContainerPaths,
    pub results_path_suffix: PathBuf,
    pub user_config_path: PathBuf,
    pub user_key_path: PathBuf,
    pub package_caches: Vec<PackageCache>,
    pub grace_period: Duration,
    pub browser_triggers: Vec<String>,
    pub sync_to_cloud: bool,
    pub metrics_enabled: bool,
}

impl AppConfig {
    pub fn resolve(config: &Config) -> Result<Self, AppError> {
        Ok(Self::with_data_dir(config, data_dir_path()?))
    }

    pub fn with_data_dir(config: &Config, data_dir: PathBuf) -> Self {
        let cache_root = data_dir.join("cache");
        Self {
            image: config.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            container: ContainerPaths::default(),
            results_path_suffix: PathBuf::from(RESULTS_PATH_SUFFIX),
            user_config_path: data_dir.join("config.json"),
            user_key_path: data_dir.join("user.key"),
            package_caches: vec![
                PackageCache { host_dir: cache_root.join("maven"), container_dir: "/root/.m2".to_string() },
                PackageCache {
                    host_dir: cache_root.join("gradle"),
                    container_dir: "/root/.gradle".to_string(),
                },
            ],
            grace_period: config.grace_period_secs.map(Duration::from_secs).unwrap_or(DEFAULT_GRACE_PERIOD),
            browser_triggers: vec![RESULTS_URL_MESSAGE.to_string()],
            sync_to_cloud: config.sync_to_cloud,
            metrics_enabled: config.metrics_enabled,
        }
    }
}

pub fn config_file_path() -> Result<PathBuf, AppError> {
    let config_root = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .ok_or_else(|| {
            AppError::config("Unable to determine configuration directory for this platform")
        })?;
    Ok(config_root.join("privado").join("config.toml"))
}

pub fn data_dir_path() -> Result<PathBuf, AppError> {
    let data_root = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(dirs::data_dir)
        .ok_or_else(|| AppError::config("Unable to determine data directory for this platform"))?;
    Ok(data_root.join("privado"))
}

pub fn ensure_config_file() -> Result<PathBuf, AppError> {
    let path = config_file_path()?;
    if !path.exists() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let default = Config::default();
        let contents = toml::to_string_pretty(&default)?;
        fs::write(&path, contents)?;
    }
    Ok(path)
}
