//! Structured context produced upstream of the analysis core

use serde::{Deserialize, Serialize};

use super::result::AnalysisKind;

/// Problem metadata or raw OCR text extracted from the screen.
///
/// Takes priority over the conversation buffer when present: the prompt is
/// built around it and the conversation becomes follow-up context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredContext {
    /// Raw OCR text of an interview page; the model extracts the problem.
    Ocr { text: String },
    /// Problem already split into its parts.
    Problem(ProblemContext),
}

/// A coding problem with optional starter code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemContext {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl StructuredContext {
    pub fn ocr(text: impl Into<String>) -> Self {
        StructuredContext::Ocr { text: text.into() }
    }

    pub fn problem(title: impl Into<String>, description: impl Into<String>) -> Self {
        StructuredContext::Problem(ProblemContext {
            title: title.into(),
            description: description.into(),
            code: None,
        })
    }

    /// Attach starter code. No-op for OCR context.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        if let StructuredContext::Problem(ref mut problem) = self {
            problem.code = Some(code.into());
        }
        self
    }

    /// The analysis kind this context selects, or `None` when it carries
    /// nothing usable and the conversation buffer should be analysed alone.
    pub fn kind(&self) -> Option<AnalysisKind> {
        match self {
            StructuredContext::Ocr { text } if !text.trim().is_empty() => {
                Some(AnalysisKind::OcrText)
            }
            StructuredContext::Problem(problem) if !problem.is_blank() => {
                Some(AnalysisKind::Problem)
            }
            _ => None,
        }
    }
}

impl ProblemContext {
    fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
            && self.description.trim().is_empty()
            && self.code.as_deref().is_none_or(|c| c.trim().is_empty())
    }
}
