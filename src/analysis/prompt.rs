//! Prompt templates and kind-scoped cache keys.

use serde::Deserialize;

use crate::types::{AnalysisKind, ProblemContext, StructuredContext};

/// OCR text beyond this many characters does not contribute to the cache key.
const OCR_KEY_CHARS: usize = 500;

/// Prompt settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Language the model is asked to write solutions in. Default: "Python".
    pub solution_language: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            solution_language: "Python".to_string(),
        }
    }
}

/// A rendered prompt together with the key its response is cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: AnalysisKind,
    pub text: String,
    pub cache_key: String,
}

/// Renders analysis prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn solution_language(&self) -> &str {
        &self.config.solution_language
    }

    /// Build the prompt for one request.
    ///
    /// `conversation` is the (possibly compressed) buffer embedded in the
    /// prompt; `raw_conversation` is the original buffer, used as the cache
    /// key for conversation-only prompts so compression cannot change it.
    pub fn build(
        &self,
        context: Option<&StructuredContext>,
        conversation: &str,
        raw_conversation: &str,
    ) -> Prompt {
        let structured = context.and_then(|ctx| ctx.kind().map(|kind| (ctx, kind)));
        match structured {
            Some((StructuredContext::Ocr { text }, kind)) => Prompt {
                kind,
                text: self.ocr_prompt(text, conversation),
                cache_key: ocr_cache_key(text),
            },
            Some((StructuredContext::Problem(problem), kind)) => Prompt {
                kind,
                text: self.problem_prompt(problem, conversation),
                cache_key: problem_cache_key(problem),
            },
            None => Prompt {
                kind: AnalysisKind::ConversationOnly,
                text: self.conversation_prompt(conversation),
                cache_key: raw_conversation.to_string(),
            },
        }
    }

    fn ocr_prompt(&self, ocr_text: &str, conversation: &str) -> String {
        let language = self.config.solution_language.to_uppercase();
        format!(
            "You are a senior technical interviewer. The following is raw OCR text extracted from a coding interview page. Your task is to:

1. **EXTRACT THE PROBLEM**: Identify and extract the main coding problem from the OCR text. Look for problem titles, descriptions, examples, and constraints.

2. **EXTRACT STARTING CODE**: If there's any code provided on the page (editor content, starter code, etc.), extract it.

3. **SOLVE THE PROBLEM**: Once you've identified the problem, provide a complete solution.

**RAW OCR TEXT FROM INTERVIEW PAGE:**
{ocr_text}
{follow_up}
**ANALYSIS REQUIREMENTS:**
1. First, clearly identify what the coding problem is (title and description)
2. If there's starting code in the OCR text, include it in your analysis
3. Provide detailed solutions with:
   - Explanation of the approach
   - Complete, working {language} code solutions (brute-force first, then optimized versions separated by ---- lines)
   - Test cases and edge cases
   - Time and space complexity analysis
4. If there's follow-up conversation context, address any additional questions or clarifications

IMPORTANT: Extract the actual problem from the OCR text first, then solve it. The OCR text may contain UI elements, headers, and other page content - focus on the coding problem itself.",
            follow_up = follow_up_section(conversation),
        )
    }

    fn problem_prompt(&self, problem: &ProblemContext, conversation: &str) -> String {
        let language = self.config.solution_language.to_uppercase();
        let code = match problem.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => format!("\n**STARTING CODE:**\n```\n{code}\n```\n"),
            _ => String::new(),
        };
        format!(
            "You are a senior technical interviewer helping with a coding interview problem.

**PROBLEM TITLE:** {title}

**PROBLEM DESCRIPTION:**
{description}
{code}{follow_up}
**ANALYSIS REQUIREMENTS:**
1. Restate the problem briefly and note any constraints
2. Provide detailed solutions with:
   - Explanation of the approach
   - Complete, working {language} code solutions (brute-force first, then optimized versions separated by ---- lines)
   - Test cases and edge cases
   - Time and space complexity analysis
3. If starting code is given, build the solution on top of it
4. If there's follow-up conversation context, address any additional questions or clarifications",
            title = problem.title.trim(),
            description = problem.description.trim(),
            follow_up = follow_up_section(conversation),
        )
    }

    fn conversation_prompt(&self, conversation: &str) -> String {
        let language = self.config.solution_language.to_uppercase();
        format!(
            "Analyze this technical interview conversation. If the last part is a question, provide a detailed solution with {language} code examples.\n\nConversation:\n{conversation}"
        )
    }
}

fn follow_up_section(conversation: &str) -> String {
    if conversation.trim().is_empty() {
        String::new()
    } else {
        format!("\n**FOLLOW-UP CONTEXT FROM CONVERSATION:**\n{conversation}\n")
    }
}

fn ocr_cache_key(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(OCR_KEY_CHARS).collect();
    let marker = if chars.next().is_some() { "..." } else { "" };
    format!("OCR:{head}{marker}")
}

fn problem_cache_key(problem: &ProblemContext) -> String {
    format!(
        "PROBLEM:{}\n{}\n{}",
        problem.title.trim(),
        problem.description.trim(),
        problem.code.as_deref().unwrap_or_default().trim()
    )
}
