//! Provider registry with a single active provider.
//!
//! The `ProviderRegistry` owns one [`ProviderDescriptor`] per configured key
//! and routes every analysis call to the *active* one. The active key can be
//! changed permanently with [`ProviderRegistry::switch_provider`], or for the
//! duration of one call with [`ProviderRegistry::analyze_with_provider`].
//!
//! # Temporary Delegation
//!
//! Delegation never writes the shared active key. The delegated key is bound
//! to the calling task for as long as the delegated future is polled:
//!
//! ```text
//!  task A: analyze_with_provider("groq")      task B: analyze()
//!            │                                         │
//!            ▼                                         │
//!   ┌─────────────────────┐                            │
//!   │ DELEGATED = "groq"  │ (task-local scope)         │
//!   │   analyze() ──► groq│                            ▼
//!   └─────────┬───────────┘                   active key ("qwen") ──► qwen
//!             │ scope exits (ok, error, drop, panic)
//!             ▼
//!   active key seen by task A is "qwen" again
//! ```
//!
//! Concurrent callers therefore never observe another task's delegation, and
//! one call's restore can never clobber another's selection.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::openai_compat::OpenAiCompatClient;
use super::retry::{RetryConfig, RetryingAdapter};
use super::traits::{ProviderAdapter, ProviderInfo};
use crate::config::{ProvidersConfig, Secrets};
use crate::telemetry;
use crate::types::AnalyzeOptions;
use crate::{CuecardError, Result};

tokio::task_local! {
    /// Key selected by an enclosing `analyze_with_provider` call.
    static DELEGATED: String;
}

/// A registered adapter together with its registry key.
///
/// Immutable after registration.
#[derive(Clone)]
pub struct ProviderDescriptor {
    key: String,
    info: ProviderInfo,
    adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("key", &self.key)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptor {
    pub fn new(key: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            key: key.into(),
            info: adapter.info().clone(),
            adapter,
        }
    }

    /// Wrap the adapter so transient failures are retried per `config`.
    pub fn with_retry(self, config: RetryConfig) -> Self {
        let adapter: Arc<dyn ProviderAdapter> =
            Arc::new(RetryingAdapter::new(self.key.clone(), self.adapter, config));
        Self { adapter, ..self }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn info(&self) -> &ProviderInfo {
        &self.info
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }
}

/// Snapshot of the provider currently serving calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProvider {
    pub key: String,
    pub name: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Registry of provider adapters with exactly one active key.
pub struct ProviderRegistry {
    providers: IndexMap<String, ProviderDescriptor>,
    active: RwLock<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("active", &self.active_key())
            .finish()
    }
}

impl ProviderRegistry {
    /// Build a registry from descriptors in registration order.
    ///
    /// The active key is `default_key` if registered, else the first
    /// registered key. Fails with [`CuecardError::NoProviderAvailable`] when
    /// `descriptors` is empty. A later descriptor with a duplicate key
    /// replaces the earlier one.
    pub fn new(
        default_key: &str,
        descriptors: impl IntoIterator<Item = ProviderDescriptor>,
    ) -> Result<Self> {
        let providers: IndexMap<String, ProviderDescriptor> = descriptors
            .into_iter()
            .map(|d| (d.key.clone(), d))
            .collect();

        let active = if providers.contains_key(default_key) {
            default_key.to_string()
        } else {
            let (first, _) = providers
                .first()
                .ok_or(CuecardError::NoProviderAvailable)?;
            info!(
                requested = default_key,
                fallback = %first,
                "default provider not registered, falling back to first registered"
            );
            first.clone()
        };

        info!(
            active = %active,
            providers = ?providers.keys().collect::<Vec<_>>(),
            "provider registry initialized"
        );

        Ok(Self {
            providers,
            active: RwLock::new(active),
        })
    }

    /// Register every configured provider that has credentials.
    pub fn initialize(config: &ProvidersConfig, secrets: &Secrets) -> Result<Self> {
        Self::new(&config.default, descriptors_from_config(config, secrets, None)?)
    }

    /// Send `prompt` to the active provider.
    ///
    /// Inside an [`analyze_with_provider`](Self::analyze_with_provider) scope
    /// the delegated provider is used instead. Adapter failures are logged
    /// and returned unchanged; registry state is never mutated.
    #[instrument(skip(self, prompt, options), fields(provider))]
    pub async fn analyze(&self, prompt: &str, options: &AnalyzeOptions) -> Result<String> {
        let key = self.active_key();
        let adapter = self
            .providers
            .get(&key)
            .map(|d| Arc::clone(&d.adapter))
            .ok_or(CuecardError::NoProviderAvailable)?;
        tracing::Span::current().record("provider", key.as_str());

        debug!(
            provider = %key,
            model = %adapter.info().model,
            prompt_chars = prompt.chars().count(),
            "dispatching analysis"
        );

        let start = Instant::now();
        match adapter.analyze(prompt, options).await {
            Ok(text) => {
                Self::record_request(&key, start, true);
                Ok(text)
            }
            Err(e) => {
                Self::record_request(&key, start, false);
                error!(provider = %key, error = %e, "LLM analysis failed");
                Err(e)
            }
        }
    }

    /// Run one [`analyze`](Self::analyze) against `key` without changing the
    /// active provider seen by anyone else.
    ///
    /// Fails with [`CuecardError::UnknownProvider`] before any call when `key`
    /// is not registered.
    #[instrument(skip(self, prompt, options), fields(delegate = key))]
    pub async fn analyze_with_provider(
        &self,
        key: &str,
        prompt: &str,
        options: &AnalyzeOptions,
    ) -> Result<String> {
        if !self.providers.contains_key(key) {
            error!(provider = key, "delegation to unregistered provider");
            return Err(CuecardError::UnknownProvider(key.to_string()));
        }

        let previous = self.active_key();
        debug!(provider = key, previous = %previous, "delegating to provider");

        let result = DELEGATED
            .scope(key.to_string(), self.analyze(prompt, options))
            .await;

        debug!(provider = %previous, "delegation finished");
        result
    }

    /// Permanently change the active provider. Returns `false` and leaves
    /// the active key unchanged when `key` is not registered.
    pub fn switch_provider(&self, key: &str) -> bool {
        if !self.providers.contains_key(key) {
            error!(provider = key, "cannot switch to unregistered provider");
            return false;
        }
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        info!(from = %active, to = key, "switched provider");
        *active = key.to_string();
        true
    }

    /// Key that an `analyze` call from this task would use.
    pub fn active_key(&self) -> String {
        DELEGATED.try_with(String::clone).unwrap_or_else(|_| {
            self.active
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// Descriptor of the provider an `analyze` call from this task would use.
    pub fn current_provider_info(&self) -> CurrentProvider {
        let key = self.active_key();
        let info = self
            .providers
            .get(&key)
            .map(|d| d.info.clone())
            .unwrap_or_else(|| ProviderInfo::new(key.clone(), String::new()));
        CurrentProvider {
            key,
            name: info.name,
            model: info.model,
            max_tokens: info.max_tokens,
            temperature: info.temperature,
        }
    }

    /// Registered keys in registration order.
    pub fn available_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.providers.contains_key(key)
    }

    pub fn descriptor(&self, key: &str) -> Option<&ProviderDescriptor> {
        self.providers.get(key)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn record_request(provider: &str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        let elapsed = start.elapsed().as_secs_f64();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider.to_owned(),
        )
        .record(elapsed);
    }
}

/// Build an [`OpenAiCompatClient`] descriptor for every configured provider
/// with credentials, in configuration order.
///
/// Providers without an API key are skipped. A provider entry that cannot be
/// resolved (no preset and no `base_url`/`model`) is a configuration error.
pub fn descriptors_from_config(
    config: &ProvidersConfig,
    secrets: &Secrets,
    retry: Option<&RetryConfig>,
) -> Result<Vec<ProviderDescriptor>> {
    let mut descriptors = Vec::with_capacity(config.entries.len());

    for (key, settings) in &config.entries {
        let resolved = settings.resolve(key)?;
        let Some(api_key) = secrets.api_key(key, &resolved.api_key_env) else {
            info!(
                provider = %key,
                env = %resolved.api_key_env,
                "provider not available (no API key)"
            );
            continue;
        };

        let model = resolved.info.model.clone();
        let client = OpenAiCompatClient::with_timeout(
            key.clone(),
            resolved.info,
            api_key,
            resolved.base_url,
            resolved.timeout,
        )?;
        info!(provider = %key, model = %model, "provider loaded");

        let descriptor = ProviderDescriptor::new(key.clone(), Arc::new(client));
        descriptors.push(match retry {
            Some(config) => descriptor.with_retry(config.clone()),
            None => descriptor,
        });
    }

    Ok(descriptors)
}
