use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::cache::ExpirationPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Environment variable that overrides `provider.api_key` when set.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Longest expiration window accepted for either TTL (one week).
pub const MAX_EXPIRATION_MINUTES: u64 = 7 * 24 * 60;

pub const SUPPORTED_UNITS: &[&str] = &["standard", "metric", "imperial"];

/// Settings for the upstream weather provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    /// One of "standard", "metric" or "imperial".
    pub units: String,
    /// Per-request timeout for outbound calls.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            units: "metric".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Expiration windows for cached records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub absolute_expiration_minutes: u64,
    pub sliding_expiration_minutes: u64,
    /// How often a running server drops expired entries.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            absolute_expiration_minutes: 30,
            sliding_expiration_minutes: 10,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn absolute_expiration(&self) -> Duration {
        Duration::from_secs(self.absolute_expiration_minutes.saturating_mul(60))
    }

    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.sliding_expiration_minutes.saturating_mul(60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn policy(&self) -> ExpirationPolicy {
        ExpirationPolicy {
            absolute: self.absolute_expiration(),
            sliding: self.sliding_expiration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [provider]
/// api_key = "..."
/// units = "metric"
///
/// [cache]
/// absolute_expiration_minutes = 30
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load config from disk plus environment overrides.
    /// The API key from the environment wins over the file.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env_key(env::var(API_KEY_ENV).ok());
        Ok(cfg)
    }

    /// Load config from disk only, or return defaults if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn apply_env_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.provider.api_key = key.trim().to_string();
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.provider.api_key.is_empty()
    }

    /// Checks everything the lookup relies on being well-formed.
    pub fn validate(&self) -> Result<()> {
        if !self.has_api_key() {
            bail!(
                "No API key configured for the weather provider.\n\
                 Hint: run `weather configure` or set {API_KEY_ENV}."
            );
        }

        let url = url::Url::parse(&self.provider.base_url)
            .with_context(|| format!("Invalid provider base_url '{}'", self.provider.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Provider base_url must be http(s), got '{}'", url.scheme());
        }

        if self.provider.timeout_secs == 0 {
            bail!("Provider timeout_secs must be at least one second");
        }

        if !SUPPORTED_UNITS.contains(&self.provider.units.as_str()) {
            bail!(
                "Unknown units '{}'. Supported units: {}.",
                self.provider.units,
                SUPPORTED_UNITS.join(", ")
            );
        }

        if self.cache.absolute_expiration_minutes == 0 || self.cache.sliding_expiration_minutes == 0
        {
            bail!("Cache expiration windows must be at least one minute");
        }

        if self.cache.absolute_expiration_minutes > MAX_EXPIRATION_MINUTES
            || self.cache.sliding_expiration_minutes > MAX_EXPIRATION_MINUTES
        {
            bail!("Cache expiration windows must be at most {MAX_EXPIRATION_MINUTES} minutes");
        }

        if self.cache.sweep_interval_secs == 0 {
            bail!("Cache sweep interval must be at least one second");
        }

        Ok(())
    }
}
