//! Builder for assembling an [`Analyzer`].

use std::sync::Arc;

use crate::analysis::{Analyzer, PromptBuilder, PromptConfig};
use crate::cache::{CacheConfig, ResponseCache};
use crate::compression::{BufferCompressor, CompressionConfig};
use crate::config::{Config, Secrets};
use crate::providers::{
    ProviderAdapter, ProviderDescriptor, ProviderRegistry, RetryConfig, descriptors_from_config,
};
use crate::Result;

/// Main entry point for creating analyzer instances.
pub struct Cuecard;

impl Cuecard {
    /// Create a new builder for configuring the analyzer.
    pub fn builder() -> CuecardBuilder {
        CuecardBuilder::new()
    }
}

/// Builder for configuring analyzer instances.
///
/// Providers come from two places: the `[providers]` table of a
/// [`Config`] passed to [`config`](Self::config) (only those with
/// credentials are registered), and adapters injected with
/// [`adapter`](Self::adapter). Without a config only injected adapters are
/// registered and built-in defaults apply to everything else.
///
/// ```rust,no_run
/// # fn main() -> cuecard::Result<()> {
/// use cuecard::{Config, Cuecard, Secrets};
///
/// let analyzer = Cuecard::builder()
///     .config(Config::load(None)?)
///     .secrets(Secrets::load()?)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CuecardBuilder {
    config: Option<Config>,
    secrets: Secrets,
    adapters: Vec<ProviderDescriptor>,
    default_provider: Option<String>,
    retry: Option<RetryConfig>,
    cache: Option<CacheConfig>,
    compression: Option<CompressionConfig>,
    prompts: Option<PromptConfig>,
}

impl CuecardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a loaded configuration, registering its credentialed providers.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// API keys for configured providers. Environment variables are
    /// consulted for any provider missing here.
    pub fn secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Register an adapter under `key`, after any configured providers.
    /// Replaces a configured provider with the same key.
    pub fn adapter(mut self, key: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(ProviderDescriptor::new(key, adapter));
        self
    }

    /// Provider to activate at startup, overriding `providers.default`.
    pub fn default_provider(mut self, key: impl Into<String>) -> Self {
        self.default_provider = Some(key.into());
        self
    }

    /// Retry transient failures on every registered provider, overriding
    /// the config's `[retry]` section.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    pub fn compression(mut self, config: CompressionConfig) -> Self {
        self.compression = Some(config);
        self
    }

    pub fn solution_language(mut self, language: impl Into<String>) -> Self {
        self.prompts = Some(PromptConfig {
            solution_language: language.into(),
        });
        self
    }

    /// Build the analyzer.
    ///
    /// Fails with [`CuecardError::NoProviderAvailable`](crate::CuecardError::NoProviderAvailable)
    /// when no provider ends up registered.
    pub fn build(self) -> Result<Analyzer> {
        let retry = self
            .retry
            .or_else(|| self.config.as_ref().and_then(Config::retry_config));

        let mut descriptors = match &self.config {
            Some(config) => descriptors_from_config(&config.providers, &self.secrets, retry.as_ref())?,
            None => Vec::new(),
        };
        descriptors.extend(self.adapters.into_iter().map(|d| match &retry {
            Some(config) => d.with_retry(config.clone()),
            None => d,
        }));

        let config = self.config.unwrap_or_default();
        let default = self.default_provider.unwrap_or(config.providers.default);
        let registry = ProviderRegistry::new(&default, descriptors)?;

        Ok(Analyzer::new(
            Arc::new(registry),
            Arc::new(ResponseCache::new(self.cache.unwrap_or(config.cache))),
            BufferCompressor::new(self.compression.unwrap_or(config.compression)),
            PromptBuilder::new(self.prompts.unwrap_or(config.analysis)),
        ))
    }
}
