//! Analysis result envelope

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compression::CompressionOutcome;

/// Which prompt template (and cache scope) an analysis used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    #[serde(rename = "ocr-text-analysis")]
    OcrText,
    #[serde(rename = "problem-analysis")]
    Problem,
    #[serde(rename = "conversation-buffer-only")]
    ConversationOnly,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::OcrText => "ocr-text-analysis",
            AnalysisKind::Problem => "problem-analysis",
            AnalysisKind::ConversationOnly => "conversation-buffer-only",
        }
    }

    /// Whether the prompt is built around structured context.
    pub fn is_structured(&self) -> bool {
        !matches!(self, AnalysisKind::ConversationOnly)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one analysis request.
///
/// Never an error: failures are reported with `success: false` and a
/// human-readable `error`. Serialized in camelCase for the IPC layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_kind: Option<AnalysisKind>,
    /// The response was served from the cache.
    pub cached: bool,
    /// A cache lookup matched (exactly or fuzzily). Mirrors `cached`; both
    /// are kept because consumers read either.
    pub cache_hit: bool,
    pub compression_info: Option<CompressionOutcome>,
}

impl AnalysisResult {
    pub(crate) fn answered(
        response: String,
        kind: AnalysisKind,
        cached: bool,
        compression_info: Option<CompressionOutcome>,
    ) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
            analysis_kind: Some(kind),
            cached,
            cache_hit: cached,
            compression_info,
        }
    }

    pub(crate) fn failed(
        error: impl fmt::Display,
        kind: AnalysisKind,
        compression_info: Option<CompressionOutcome>,
    ) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.to_string()),
            analysis_kind: Some(kind),
            cached: false,
            cache_hit: false,
            compression_info,
        }
    }
}
