//! Analysis orchestration.
//!
//! [`Analyzer`] is the single entry point the IPC layer calls. One request
//! flows through:
//!
//! ```text
//!  buffer + context
//!        │
//!        ▼
//!  kind (ocr / problem / conversation)
//!        │
//!        ▼
//!  BufferCompressor ── only when the active provider is the expensive one
//!        │
//!        ▼
//!  PromptBuilder ──► prompt text + kind-scoped cache key
//!        │
//!        ▼
//!  ResponseCache::find_similar ── hit ──► cached result
//!        │ miss (or forced)
//!        ▼
//!  ProviderRegistry::analyze ──► store ──► fresh result
//! ```
//!
//! Failures never escape: they come back as `AnalysisResult { success: false, .. }`.

mod prompt;

pub use prompt::{Prompt, PromptBuilder, PromptConfig};

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::cache::{CacheMetadata, CacheStats, ResponseCache};
use crate::compression::BufferCompressor;
use crate::providers::{CurrentProvider, ProviderRegistry};
use crate::types::{AnalysisResult, AnalyzeOptions, StructuredContext};

/// Analysis orchestrator. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Analyzer {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResponseCache>,
    compressor: BufferCompressor,
    prompts: PromptBuilder,
}

impl Analyzer {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResponseCache>,
        compressor: BufferCompressor,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            registry,
            cache,
            compressor,
            prompts,
        }
    }

    /// Analyze a conversation buffer, optionally around structured context.
    ///
    /// With `force_new` the cache is not consulted, but the fresh response
    /// is still stored.
    pub async fn analyze(
        &self,
        buffer: &str,
        context: Option<&StructuredContext>,
        force_new: bool,
    ) -> AnalysisResult {
        self.analyze_with_options(buffer, context, force_new, &AnalyzeOptions::default())
            .await
    }

    /// [`analyze`](Self::analyze) with per-call adapter options (temperature,
    /// token cap, cancellation).
    #[instrument(skip_all, fields(buffer_chars = buffer.chars().count(), force_new = force_new, kind))]
    pub async fn analyze_with_options(
        &self,
        buffer: &str,
        context: Option<&StructuredContext>,
        force_new: bool,
        options: &AnalyzeOptions,
    ) -> AnalysisResult {
        let active = self.registry.active_key();

        let (conversation, compression_info) = if self.compressor.applies_to(&active, buffer) {
            info!(provider = %active, "expensive provider active, compressing conversation");
            let compressed = self.compressor.compress(&self.registry, buffer).await;
            (compressed.text, Some(compressed.outcome))
        } else {
            (buffer.to_string(), None)
        };

        let prompt = self.prompts.build(context, &conversation, buffer);
        tracing::Span::current().record("kind", prompt.kind.as_str());

        if !force_new && let Some(hit) = self.cache.find_similar(&prompt.cache_key) {
            info!(kind = %prompt.kind, exact = hit.exact, "returning cached analysis");
            return AnalysisResult::answered(hit.response, prompt.kind, true, compression_info);
        }

        match self.registry.analyze(&prompt.text, options).await {
            Ok(response) => {
                let metadata = CacheMetadata::new(prompt.kind, prompt.text.chars().count())
                    .tag("provider", active)
                    .tag("structured", prompt.kind.is_structured());
                self.cache.store(&prompt.cache_key, response.clone(), metadata);
                info!(kind = %prompt.kind, response_chars = response.chars().count(), "analysis completed");
                AnalysisResult::answered(response, prompt.kind, false, compression_info)
            }
            Err(e) => {
                error!(kind = %prompt.kind, error = %e, "analysis failed");
                AnalysisResult::failed(e, prompt.kind, compression_info)
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn available_providers(&self) -> Vec<String> {
        self.registry.available_providers()
    }

    pub fn current_provider_info(&self) -> CurrentProvider {
        self.registry.current_provider_info()
    }

    pub fn switch_provider(&self, key: &str) -> bool {
        self.registry.switch_provider(key)
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn compressor(&self) -> &BufferCompressor {
        &self.compressor
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }
}
