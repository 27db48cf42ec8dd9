//! Configuration loading and resolution
//!
//! Settings come from a TOML file located with this priority order:
//! 1. Command-line `--config` path (highest priority)
//! 2. `TRIALIST_CONFIG` environment variable
//! 3. Per-user config file (`~/.config/trialist/config.toml`)
//! 4. System config file (`/etc/trialist/config.toml`)
//!
//! A path given explicitly (1 or 2) must exist. When nothing is found in the
//! default locations the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TRIALIST_CONFIG";

/// Environment variable overriding `database_url`
pub const DATABASE_URL_ENV_VAR: &str = "TRIALIST_DATABASE_URL";

/// Campaign processed when no campaign is configured
pub const DEFAULT_CAMPAIGN_ID: &str = "urn:campaign:trialist";

/// OpenCPU endpoint wrapping the N-of-1 analysis package
pub const DEFAULT_ANALYSIS_URL: &str =
    "https://pilots.ohmage.org/ocpu/github/jservadio/TrialistNof1/R/wrap/json";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// sqlx connection URL of the survey database
    pub database_url: Option<String>,
    /// Remote analysis service endpoint
    pub analysis_url: Option<String>,
    /// HTTP timeout for the analysis service
    pub request_timeout_secs: Option<u64>,
    /// Campaign used when no run parameter names one
    pub default_campaign_id: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config file {} failed: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Parse config file {} failed: {}", path.display(), e))
        })
    }
}

/// Values used when neither the TOML file nor the environment supplies one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub analysis_url: String,
    pub request_timeout_secs: u64,
    pub campaign_id: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            analysis_url: DEFAULT_ANALYSIS_URL.to_string(),
            request_timeout_secs: 60,
            campaign_id: DEFAULT_CAMPAIGN_ID.to_string(),
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Report the source; call after the tracing subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

/// Parsed config file together with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

/// Locates and loads the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Explicitly requested config path (CLI, then environment)
    pub fn explicit_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }
        std::env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// First existing file among the default locations
    pub fn discovered_path() -> Option<PathBuf> {
        let user_config = dirs::config_dir().map(|d| d.join("trialist").join("config.toml"));
        let system_config = PathBuf::from("/etc/trialist/config.toml");

        user_config
            .into_iter()
            .chain(std::iter::once(system_config))
            .find(|p| p.exists())
    }

    /// Load the TOML config following the priority order
    ///
    /// Runs before logging is set up, so nothing is logged here.
    pub fn load(&self) -> Result<LoadedConfig> {
        let path = match self.explicit_path() {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path),
            None => Self::discovered_path(),
        };

        match path {
            Some(path) => Ok(LoadedConfig {
                config: TomlConfig::load(&path)?,
                source: ConfigSource::File(path),
            }),
            None => Ok(LoadedConfig {
                config: TomlConfig::default(),
                source: ConfigSource::Defaults,
            }),
        }
    }
}

/// Fully resolved settings needed before a run touches any data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub database_url: String,
    pub analysis_url: String,
    pub request_timeout: Duration,
    pub default_campaign_id: String,
    pub log_level: String,
}

impl ServiceSettings {
    /// Merge CLI, environment and TOML values
    ///
    /// `database_url` priority: CLI → `TRIALIST_DATABASE_URL` → TOML.
    /// Fails when no database URL is available.
    pub fn resolve(cli_database_url: Option<&str>, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let env_database_url = std::env::var(DATABASE_URL_ENV_VAR).ok();
        let database_url = cli_database_url
            .map(str::to_string)
            .or(env_database_url)
            .or_else(|| toml_config.database_url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "database_url is not configured. Set it using one of:\n\
                     1. Command line: --database-url sqlite:///path/to/trialist.db\n\
                     2. Environment: {}=sqlite:///path/to/trialist.db\n\
                     3. TOML config: database_url = \"sqlite:///path/to/trialist.db\"",
                    DATABASE_URL_ENV_VAR
                ))
            })?;

        let analysis_url = toml_config
            .analysis_url
            .clone()
            .unwrap_or(defaults.analysis_url);
        if !(analysis_url.starts_with("https://") || analysis_url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "analysis_url must be an http(s) URL: {}",
                analysis_url
            )));
        }

        let timeout_secs = toml_config
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            analysis_url,
            request_timeout: Duration::from_secs(timeout_secs),
            default_campaign_id: toml_config
                .default_campaign_id
                .clone()
                .unwrap_or(defaults.campaign_id),
            log_level: toml_config.logging.level.clone(),
        })
    }
}
