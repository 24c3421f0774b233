//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. an explicit path (e.g. `wayctl --config <path>`)
//! 2. `~/.waypost/config.toml` (user)
//! 3. `/etc/waypost/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.waypost/secrets.toml` (user, must be 0600 or 0400)
//! 2. `/etc/waypost/secrets.toml` (system, must be 0600 or 0400)
//!
//! Missing API keys fall back to `TOMTOM_API_KEY` / `GEOAPIFY_API_KEY`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, FailureCacheConfig, Operation};
use crate::providers::{CircuitConfig, RetryConfig};
use crate::usage::UsageConfig;
use crate::{Result, WaypostError};

/// Client configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub circuit: CircuitSection,
    /// Coalesce concurrent identical requests (default: true).
    #[serde(default = "default_true")]
    pub coalesce_requests: bool,
}

/// Per-vendor settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub tomtom: TomTomConfig,
    #[serde(default)]
    pub geoapify: GeoapifyConfig,
    #[serde(default)]
    pub nominatim: EndpointConfig,
    #[serde(default)]
    pub osrm: EndpointConfig,
    #[serde(default)]
    pub backend: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomTomConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Country filter for searches (default: "PH").
    #[serde(default)]
    pub country_set: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Ask TomTom for live traffic flow (default: true). When false the
    /// backend proxy answers every flow query.
    #[serde(default = "default_true")]
    pub traffic_flow_enabled: bool,
}

impl Default for TomTomConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            country_set: None,
            language: None,
            traffic_flow_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoapifyConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Country filter (default: "ph").
    #[serde(default)]
    pub country_code: Option<String>,
}

/// A vendor that only needs a base URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Request budget and per-request limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Successful primary requests per local day (default: 2500).
    #[serde(default = "default_daily_limit")]
    pub daily_request_limit: u32,
    /// Minimum seconds between successful primary requests (default: 9000).
    #[serde(default = "default_min_interval")]
    pub min_request_interval_secs: u64,
    /// Timeout per primary attempt in seconds (default: 10).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Extra attempts for transient failures (default: 0).
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_request_limit: default_daily_limit(),
            min_request_interval_secs: default_min_interval(),
            request_timeout_secs: default_timeout(),
            max_retries: 0,
        }
    }
}

/// Cache sizing and TTLs.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Response cache capacity (default: unbounded).
    #[serde(default)]
    pub max_entries: Option<u64>,
    /// Per-operation TTL overrides in seconds, keyed by operation name
    /// (`geocode`, `traffic_flow`, ...).
    #[serde(default)]
    pub ttl_secs: HashMap<Operation, u64>,
    /// How long a 403/429 keeps a key away from the primary (default: 86400).
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: None,
            ttl_secs: HashMap::new(),
            failure_ttl_secs: default_failure_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitSection {
    /// Consecutive 403/429 responses that open the circuit (default: 3).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds before an open circuit lets a probe through (default: 60).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for CircuitSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_daily_limit() -> u32 {
    2_500
}

fn default_min_interval() -> u64 {
    9_000
}

fn default_timeout() -> u64 {
    10
}

fn default_failure_ttl() -> u64 {
    24 * 3600
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown() -> u64 {
    60
}

impl LimitsConfig {
    pub fn usage(&self) -> UsageConfig {
        UsageConfig::new()
            .daily_limit(self.daily_request_limit)
            .min_interval(Duration::from_secs(self.min_request_interval_secs))
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new().max_retries(self.max_retries)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheSection {
    pub fn responses(&self) -> CacheConfig {
        let mut config = CacheConfig::new();
        if let Some(max) = self.max_entries {
            config = config.max_entries(max);
        }
        for (&operation, &secs) in &self.ttl_secs {
            config = config.ttl(operation, Duration::from_secs(secs));
        }
        config
    }

    pub fn failures(&self) -> FailureCacheConfig {
        FailureCacheConfig::new().ttl(Duration::from_secs(self.failure_ttl_secs))
    }
}

impl CircuitSection {
    pub fn circuit(&self) -> CircuitConfig {
        CircuitConfig::new()
            .failure_threshold(self.failure_threshold)
            .cooldown(Duration::from_secs(self.cooldown_secs))
    }
}

/// API keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub tomtom: Option<ApiKeySecret>,
    #[serde(default)]
    pub geoapify: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Provider name → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("tomtom", "TOMTOM_API_KEY"),
    ("geoapify", "GEOAPIFY_API_KEY"),
];

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but defaults when no file exists. An
    /// explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => Self::load_from_file(&path),
            Err(_) if explicit_path.is_none() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WaypostError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            WaypostError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(WaypostError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".waypost").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/waypost/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(WaypostError::Configuration(
            "No config file found. Create ~/.waypost/config.toml or /etc/waypost/config.toml"
                .to_string(),
        ))
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".waypost").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/waypost/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file. Its permissions are checked first.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            WaypostError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            WaypostError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// The file must not be readable by group or others (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            WaypostError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(WaypostError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a provider, falling back to its environment variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let from_file = match provider {
            "tomtom" => self.tomtom.as_ref(),
            "geoapify" => self.geoapify.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }
}
