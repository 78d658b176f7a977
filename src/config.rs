//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (explicit, must exist)
//! 2. `~/.cuecard/config.toml` (user)
//! 3. `/etc/cuecard/config.toml` (system)
//! 4. built-in defaults (the `groq` and `qwen` presets)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.cuecard/secrets.toml` (user, must be 0600)
//! 2. `/etc/cuecard/secrets.toml` (system, must be 0600)
//!
//! A provider whose key is in neither the secrets file nor its environment
//! variable is not registered.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

use crate::analysis::PromptConfig;
use crate::cache::CacheConfig;
use crate::compression::CompressionConfig;
use crate::providers::openai_compat::{self, DEFAULT_TIMEOUT, GROQ, QWEN};
use crate::providers::{ProviderInfo, RetryConfig};
use crate::{CuecardError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub analysis: PromptConfig,
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

/// Registry configuration: the default key plus one table per provider.
///
/// ```toml
/// [providers]
/// default = "groq"
///
/// [providers.groq]
/// model = "qwen/qwen3-32b"
/// max_tokens = 20000
/// temperature = 0.7
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Provider to activate at startup (default: "groq").
    #[serde(default = "default_provider")]
    pub default: String,
    #[serde(flatten)]
    pub entries: IndexMap<String, ProviderSettings>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let mut entries = IndexMap::new();
        entries.insert(GROQ.key.to_string(), ProviderSettings::default());
        entries.insert(QWEN.key.to_string(), ProviderSettings::default());
        Self {
            default: default_provider(),
            entries,
        }
    }
}

fn default_provider() -> String {
    GROQ.key.to_string()
}

/// Per-provider settings. Unset fields fall back to the built-in preset
/// for the provider's key; keys without a preset need `base_url` and
/// `model`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Request timeout in seconds (default: 60).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Provider settings merged with its preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub key: String,
    pub info: ProviderInfo,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Merge with the preset for `key`. Returns an error naming the missing
    /// field when neither side provides it.
    pub fn resolve(&self, key: &str) -> Result<ResolvedProvider> {
        let preset = openai_compat::preset(key);
        let missing = |field: &str| {
            CuecardError::Configuration(format!("provider '{key}' has no {field} configured"))
        };

        let base_url = self
            .base_url
            .clone()
            .or_else(|| preset.map(|p| p.base_url.to_string()))
            .ok_or_else(|| missing("base_url"))?;
        let model = self
            .model
            .clone()
            .or_else(|| preset.map(|p| p.model.to_string()))
            .ok_or_else(|| missing("model"))?;
        let name = self
            .name
            .clone()
            .or_else(|| preset.map(|p| p.name.to_string()))
            .unwrap_or_else(|| key.to_string());
        let max_tokens = self
            .max_tokens
            .or(preset.map(|p| p.max_tokens))
            .unwrap_or(4000);
        let temperature = self
            .temperature
            .or(preset.map(|p| p.temperature))
            .unwrap_or(0.7);
        let api_key_env = self
            .api_key_env
            .clone()
            .or_else(|| preset.map(|p| p.api_key_env.to_string()))
            .unwrap_or_else(|| format!("{}_API_KEY", key.to_uppercase().replace('-', "_")));

        Ok(ResolvedProvider {
            key: key.to_string(),
            info: ProviderInfo::new(name, model)
                .max_tokens(max_tokens)
                .temperature(temperature),
            base_url,
            api_key_env,
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// Retry settings as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig::new()
            .max_attempts(settings.max_attempts)
            .initial_delay(Duration::from_millis(settings.initial_delay_ms))
            .max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

/// Secrets configuration (API keys), keyed by provider.
///
/// ```toml
/// [groq]
/// api_key = "gsk_..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(flatten)]
    pub providers: HashMap<String, ApiKeySecret>,
}

/// A single API key secret.
#[derive(Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl std::fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKeySecret(..)")
    }
}

impl Config {
    /// Load configuration from the standard locations, falling back to
    /// built-in defaults when no file exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                info!("no config file found, using built-in defaults");
                Ok(Config::default())
            }
        }
    }

    /// Parse a config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CuecardError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CuecardError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the config file path. `Ok(None)` means no file was found in
    /// the standard locations.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(CuecardError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cuecard").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/cuecard/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Retry configuration, if a `[retry]` section is present.
    pub fn retry_config(&self) -> Option<RetryConfig> {
        self.retry.as_ref().map(RetryConfig::from)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (providers may use env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".cuecard").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/cuecard/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Parse a secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            CuecardError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            CuecardError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            CuecardError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(CuecardError::Configuration(format!(
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

    /// Insert a key programmatically.
    pub fn with_key(mut self, provider: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.providers.insert(
            provider.into(),
            ApiKeySecret {
                api_key: api_key.into(),
            },
        );
        self
    }

    /// API key for a provider, falling back to `env_var`. Blank values count
    /// as absent.
    pub fn api_key(&self, provider: &str, env_var: &str) -> Option<String> {
        self.providers
            .get(provider)
            .map(|s| s.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
