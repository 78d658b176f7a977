//! Cuecard - analysis core of a real-time interview assistant
//!
//! This crate turns a live conversation transcript (optionally paired with
//! OCR text or problem metadata captured from the screen) into a prompt,
//! sends it to one of several OpenAI-compatible LLM providers, and caches
//! the answer under a fuzzy content fingerprint so near-identical questions
//! are answered instantly.
//!
//! # Example
//!
//! ```rust,no_run
//! use cuecard::{Config, Cuecard, Secrets, StructuredContext};
//!
//! #[tokio::main]
//! async fn main() -> cuecard::Result<()> {
//!     let analyzer = Cuecard::builder()
//!         .config(Config::load(None)?)
//!         .secrets(Secrets::load()?)
//!         .build()?;
//!
//!     let context = StructuredContext::problem("Two Sum", "Return indices of two numbers adding to target");
//!     let result = analyzer
//!         .analyze("Interviewer: can you do better than O(n^2)?", Some(&context), false)
//!         .await;
//!
//!     match result.response {
//!         Some(answer) => println!("{answer}"),
//!         None => eprintln!("analysis failed: {}", result.error.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Components
//!
//! - [`providers`]: the adapter contract, the OpenAI-compatible client and
//!   the registry that selects the active provider
//! - [`cache`]: fingerprinting and the fuzzy LRU response cache
//! - [`compression`]: conversation summarization for expensive providers
//! - [`analysis`]: the orchestrator tying them together

pub mod analysis;
mod builder;
pub mod cache;
pub mod compression;
pub mod config;
pub mod error;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use analysis::{Analyzer, PromptConfig};
pub use builder::{Cuecard, CuecardBuilder};
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use compression::{BufferCompressor, CompressionConfig, CompressionMethod, CompressionOutcome};
pub use config::{Config, Secrets};
pub use error::{CallFailure, CuecardError, Result};
pub use providers::{
    CurrentProvider, OpenAiCompatClient, ProviderAdapter, ProviderDescriptor, ProviderInfo,
    ProviderRegistry, RetryConfig,
};
pub use types::{AnalysisKind, AnalysisResult, AnalyzeOptions, ProblemContext, StructuredContext};
