//! Conversation buffer compression for token-expensive providers.
//!
//! When the active provider is the configured expensive one, long
//! conversation buffers are summarized by the cheap provider before they are
//! embedded in a prompt. A summary that does not shrink the buffer enough is
//! rejected and the buffer is hard-truncated instead.
//!
//! # Decision Flow
//!
//! ```text
//!   buffer (≥ min_chars)
//!          │
//!          ▼
//!   ┌──────────────────────┐   call fails    ┌──────────────────────┐
//!   │ summarizer provider  │ ──────────────► │ truncate             │
//!   │ (delegated call)     │                 │ first N chars + "..."│
//!   └─────────┬────────────┘                 └──────────────────────┘
//!             │ summary                                ▲
//!             ▼                                        │ degenerate
//!   len ≤ ratio·original && len > min_summary? ── no ──┘
//!             │ yes
//!             ▼
//!        summarized
//! ```
//!
//! Lengths are counted in characters, not bytes.

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

use crate::providers::ProviderRegistry;
use crate::telemetry;
use crate::types::AnalyzeOptions;

const ELLIPSIS: &str = "...";

/// Compression thresholds and provider roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Provider whose prompts get compressed. Default: "qwen".
    pub expensive_provider: String,
    /// Provider that writes the summary. Default: "groq".
    pub summarizer: String,
    /// Buffers shorter than this are left alone. Default: 1000.
    pub min_chars: usize,
    /// Characters kept by the truncation fallback. Default: 800.
    pub truncate_chars: usize,
    /// A summary must be at most `max_ratio * original`. Default: 0.8.
    pub max_ratio: f64,
    /// A summary must be longer than this. Default: 50.
    pub min_summary_chars: usize,
    pub summary_temperature: f32,
    pub summary_max_tokens: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expensive_provider: "qwen".to_string(),
            summarizer: "groq".to_string(),
            min_chars: 1000,
            truncate_chars: 800,
            max_ratio: 0.8,
            min_summary_chars: 50,
            summary_temperature: 0.1,
            summary_max_tokens: 500,
        }
    }
}

impl CompressionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn compression off entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn expensive_provider(mut self, key: impl Into<String>) -> Self {
        self.expensive_provider = key.into();
        self
    }

    pub fn summarizer(mut self, key: impl Into<String>) -> Self {
        self.summarizer = key.into();
        self
    }

    pub fn min_chars(mut self, n: usize) -> Self {
        self.min_chars = n;
        self
    }

    pub fn truncate_chars(mut self, n: usize) -> Self {
        self.truncate_chars = n;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    Summarized,
    Truncated,
}

impl CompressionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMethod::Summarized => "summarized",
            CompressionMethod::Truncated => "truncated",
        }
    }
}

/// Why truncation was used instead of the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The summary did not shrink the buffer enough, or was nearly empty.
    Degenerate,
    /// The summarizer call failed.
    SummaryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BelowThreshold,
    NoReductionAchieved,
}

/// What the compressor did to a buffer.
///
/// Serializes flat for the IPC layer:
/// `{"performed":true,"method":"summarized","originalChars":2000,"compressedChars":1000,"compressionRatio":50.0}`
/// or `{"performed":false,"reason":"below_threshold","originalChars":300}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    Performed {
        method: CompressionMethod,
        original_chars: usize,
        compressed_chars: usize,
        /// Set when truncation replaced a summary attempt.
        fallback: Option<FallbackReason>,
    },
    Skipped {
        reason: SkipReason,
        original_chars: usize,
    },
}

impl CompressionOutcome {
    pub fn performed(&self) -> bool {
        matches!(self, CompressionOutcome::Performed { .. })
    }

    pub fn method(&self) -> Option<CompressionMethod> {
        match self {
            CompressionOutcome::Performed { method, .. } => Some(*method),
            CompressionOutcome::Skipped { .. } => None,
        }
    }

    /// Size reduction in percent, rounded to one decimal.
    pub fn reduction_percent(&self) -> Option<f64> {
        match *self {
            CompressionOutcome::Performed {
                original_chars,
                compressed_chars,
                ..
            } if original_chars > 0 => {
                let saved = original_chars.saturating_sub(compressed_chars) as f64;
                Some((saved / original_chars as f64 * 1000.0).round() / 10.0)
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeWire {
    performed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<CompressionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<FallbackReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<SkipReason>,
    original_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    compressed_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression_ratio: Option<f64>,
}

impl Serialize for CompressionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match *self {
            CompressionOutcome::Performed {
                method,
                original_chars,
                compressed_chars,
                fallback,
            } => OutcomeWire {
                performed: true,
                method: Some(method),
                fallback,
                reason: None,
                original_chars,
                compressed_chars: Some(compressed_chars),
                compression_ratio: self.reduction_percent(),
            },
            CompressionOutcome::Skipped {
                reason,
                original_chars,
            } => OutcomeWire {
                performed: false,
                method: None,
                fallback: None,
                reason: Some(reason),
                original_chars,
                compressed_chars: None,
                compression_ratio: None,
            },
        };
        wire.serialize(serializer)
    }
}

/// A buffer after compression, with the record of how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct Compressed {
    pub text: String,
    pub outcome: CompressionOutcome,
}

/// Shrinks conversation buffers before they reach an expensive provider.
#[derive(Debug, Clone, Default)]
pub struct BufferCompressor {
    config: CompressionConfig,
}

impl BufferCompressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Whether a buffer headed for `active_key` should be compressed.
    pub fn applies_to(&self, active_key: &str, buffer: &str) -> bool {
        self.config.enabled
            && active_key == self.config.expensive_provider
            && !buffer.trim().is_empty()
    }

    /// Compress `buffer`, summarizing through the registry's summarizer
    /// provider and truncating when that fails or does not help.
    ///
    /// Never fails: every problem degrades to truncation.
    pub async fn compress(&self, registry: &ProviderRegistry, buffer: &str) -> Compressed {
        let original_chars = buffer.chars().count();
        if original_chars < self.config.min_chars {
            info!(
                original_chars,
                min_chars = self.config.min_chars,
                "buffer already short, skipping compression"
            );
            return Compressed {
                text: buffer.to_string(),
                outcome: CompressionOutcome::Skipped {
                    reason: SkipReason::BelowThreshold,
                    original_chars,
                },
            };
        }

        let options = AnalyzeOptions::new()
            .temperature(self.config.summary_temperature)
            .max_tokens(self.config.summary_max_tokens);
        let prompt = summary_prompt(buffer);

        let fallback = match registry
            .analyze_with_provider(&self.config.summarizer, &prompt, &options)
            .await
        {
            Ok(summary) => {
                let summary = summary.trim();
                let summary_chars = summary.chars().count();
                if self.accepts(summary_chars, original_chars) {
                    let outcome = CompressionOutcome::Performed {
                        method: CompressionMethod::Summarized,
                        original_chars,
                        compressed_chars: summary_chars,
                        fallback: None,
                    };
                    Self::record(&outcome);
                    info!(
                        original_chars,
                        compressed_chars = summary_chars,
                        reduction = outcome.reduction_percent(),
                        "conversation summarized"
                    );
                    return Compressed {
                        text: summary.to_string(),
                        outcome,
                    };
                }
                warn!(
                    original_chars,
                    summary_chars, "summary too long or too short, truncating instead"
                );
                FallbackReason::Degenerate
            }
            Err(e) => {
                warn!(
                    summarizer = %self.config.summarizer,
                    error = %e,
                    "summarization failed, truncating instead"
                );
                FallbackReason::SummaryFailed
            }
        };

        self.truncate(buffer, original_chars, fallback)
    }

    fn accepts(&self, summary_chars: usize, original_chars: usize) -> bool {
        (summary_chars as f64) <= self.config.max_ratio * original_chars as f64
            && summary_chars > self.config.min_summary_chars
    }

    fn truncate(&self, buffer: &str, original_chars: usize, fallback: FallbackReason) -> Compressed {
        let keep = self.config.truncate_chars;
        let truncated_chars = keep + ELLIPSIS.chars().count();
        if original_chars <= keep || truncated_chars >= original_chars {
            return Compressed {
                text: buffer.to_string(),
                outcome: CompressionOutcome::Skipped {
                    reason: SkipReason::NoReductionAchieved,
                    original_chars,
                },
            };
        }

        let mut text: String = buffer.chars().take(keep).collect();
        text.push_str(ELLIPSIS);
        let outcome = CompressionOutcome::Performed {
            method: CompressionMethod::Truncated,
            original_chars,
            compressed_chars: truncated_chars,
            fallback: Some(fallback),
        };
        Self::record(&outcome);
        info!(
            original_chars,
            compressed_chars = truncated_chars,
            "conversation truncated"
        );
        Compressed { text, outcome }
    }

    fn record(outcome: &CompressionOutcome) {
        if let Some(method) = outcome.method() {
            metrics::counter!(telemetry::COMPRESSIONS_TOTAL, "method" => method.as_str())
                .increment(1);
        }
    }
}

fn summary_prompt(buffer: &str) -> String {
    format!(
        "Summarize this interview conversation in a much shorter form, keeping only the essential technical content:\n\n{buffer}\n\nSummary:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_only_to_expensive_provider_with_content() {
        let compressor = BufferCompressor::default();
        assert!(compressor.applies_to("qwen", "some talk"));
        assert!(!compressor.applies_to("groq", "some talk"));
        assert!(!compressor.applies_to("qwen", "  \n"));
        assert!(!BufferCompressor::new(CompressionConfig::disabled()).applies_to("qwen", "x"));
    }

    #[test]
    fn acceptance_bounds() {
        let compressor = BufferCompressor::default();
        assert!(compressor.accepts(1000, 2000));
        assert!(!compressor.accepts(1300, 1500));
        assert!(compressor.accepts(1200, 1500));
        assert!(!compressor.accepts(1201, 1500));
        assert!(!compressor.accepts(50, 2000));
        assert!(compressor.accepts(51, 2000));
    }

    #[test]
    fn truncation_counts_characters() {
        let compressor = BufferCompressor::default();
        let buffer = "é".repeat(1200);
        let result = compressor.truncate(&buffer, 1200, FallbackReason::SummaryFailed);
        assert_eq!(result.text.chars().count(), 803);
        assert!(result.text.ends_with("..."));
        assert_eq!(result.outcome.method(), Some(CompressionMethod::Truncated));
    }

    #[test]
    fn outcome_serializes_flat() {
        let outcome = CompressionOutcome::Performed {
            method: CompressionMethod::Summarized,
            original_chars: 2000,
            compressed_chars: 1000,
            fallback: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["performed"], true);
        assert_eq!(json["method"], "summarized");
        assert_eq!(json["compressionRatio"], 50.0);
        assert!(json.get("fallback").is_none());

        let skipped = CompressionOutcome::Skipped {
            reason: SkipReason::BelowThreshold,
            original_chars: 300,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["performed"], false);
        assert_eq!(json["reason"], "below_threshold");
        assert_eq!(json["originalChars"], 300);
    }
}
