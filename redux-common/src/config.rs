//! Configuration loading and settings resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: the resolver logs a
//! warning and carries on with the remaining tiers.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default remote processing endpoint
pub const DEFAULT_ENDPOINT: &str = "https://redux-ai.onrender.com/traiter-fichier";

/// Default local bind address for the widget server
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Default total request timeout in seconds (0 disables the timeout)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default safety-net delay before an unclaimed result artifact is released
///
/// The browser widget revoked its download URL after a fixed 10 s. Results
/// here are also released on a new selection, a dismiss or shutdown, so the
/// timer only bounds memory for results nobody touches again.
pub const DEFAULT_RELEASE_AFTER_SECS: u64 = 600;

/// Default cap on accepted upload size (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub const ENV_ENDPOINT: &str = "REDUX_ENDPOINT";
pub const ENV_BIND: &str = "REDUX_BIND";
pub const ENV_OUTPUT_DIR: &str = "REDUX_OUTPUT_DIR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REDUX_REQUEST_TIMEOUT_SECS";
pub const ENV_RELEASE_AFTER_SECS: &str = "REDUX_RELEASE_AFTER_SECS";

/// Bootstrap configuration loaded from TOML file
///
/// All fields are optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Remote processing endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Local bind address for `serve`
    #[serde(default)]
    pub bind: Option<String>,

    /// Directory where processed files are written
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Total request timeout in seconds (0 disables)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Safety-net release delay for result artifacts, in seconds
    #[serde(default)]
    pub release_after_secs: Option<u64>,

    /// Largest accepted selection, in bytes
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

/// Compiled-in defaults, used when no other tier provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub endpoint: String,
    pub bind: String,
    pub output_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub release_after_secs: u64,
    pub max_upload_bytes: usize,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            output_dir: default_output_dir(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            release_after_secs: DEFAULT_RELEASE_AFTER_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Downloads folder when the platform has one, current directory otherwise
fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Values supplied on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub bind: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub release_after_secs: Option<u64>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub bind: String,
    pub output_dir: PathBuf,
    /// `None` when the timeout is disabled
    pub request_timeout: Option<Duration>,
    pub release_after: Duration,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

/// Resolves [`Settings`] from the four configuration tiers
pub struct SettingsResolver {
    config_path: Option<PathBuf>,
}

impl SettingsResolver {
    /// Resolver reading the default per-user config file
    pub fn new() -> Self {
        Self {
            config_path: default_config_path(),
        }
    }

    /// Resolver reading an explicit config file
    pub fn with_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Config file this resolver reads, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load the TOML tier, degrading to an empty config on any problem
    pub fn load_toml(&self) -> TomlConfig {
        let Some(path) = &self.config_path else {
            warn!("No config directory available; using defaults");
            return TomlConfig::default();
        };

        if !path.exists() {
            info!("Config file not found at {}; using defaults", path.display());
            return TomlConfig::default();
        }

        match load_toml_config(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }

    /// Resolve all settings
    pub fn resolve(&self, cli: &CliOverrides) -> Settings {
        let toml = self.load_toml();
        resolve_settings(cli, &toml, &CompiledDefaults::for_current_platform())
    }
}

impl Default for SettingsResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Combine the tiers into final settings
///
/// Environment variables are read here; malformed numeric values are logged
/// and skipped so the next tier applies.
pub fn resolve_settings(
    cli: &CliOverrides,
    toml: &TomlConfig,
    defaults: &CompiledDefaults,
) -> Settings {
    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| env_string(ENV_ENDPOINT))
        .or_else(|| toml.endpoint.clone())
        .unwrap_or_else(|| defaults.endpoint.clone());

    let bind = cli
        .bind
        .clone()
        .or_else(|| env_string(ENV_BIND))
        .or_else(|| toml.bind.clone())
        .unwrap_or_else(|| defaults.bind.clone());

    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| env_string(ENV_OUTPUT_DIR).map(PathBuf::from))
        .or_else(|| toml.output_dir.clone())
        .unwrap_or_else(|| defaults.output_dir.clone());

    let request_timeout_secs = cli
        .request_timeout_secs
        .or_else(|| env_number(ENV_REQUEST_TIMEOUT_SECS))
        .or(toml.request_timeout_secs)
        .unwrap_or(defaults.request_timeout_secs);

    let release_after_secs = cli
        .release_after_secs
        .or_else(|| env_number(ENV_RELEASE_AFTER_SECS))
        .or(toml.release_after_secs)
        .unwrap_or(defaults.release_after_secs);

    Settings {
        endpoint,
        bind,
        output_dir,
        request_timeout: (request_timeout_secs > 0)
            .then(|| Duration::from_secs(request_timeout_secs)),
        release_after: Duration::from_secs(release_after_secs),
        max_upload_bytes: toml.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
        log_level: toml.logging.level.clone(),
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

/// Per-user config file location: `<config_dir>/redux/redux-up.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("redux").join("redux-up.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
