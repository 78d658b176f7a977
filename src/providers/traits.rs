//! The provider adapter contract.
//!
//! Every remote LLM endpoint is wrapped in one [`ProviderAdapter`]. Adapters
//! expose a single capability (`analyze`) and a static [`ProviderInfo`]
//! record; they share no mutable state with each other.
//!
//! # Failure Semantics
//!
//! Adapters report every transport, authentication, quota, timeout or
//! cancellation problem as [`CuecardError::ProviderCallFailed`](crate::CuecardError::ProviderCallFailed)
//! carrying their registry key and a [`CallFailure`](crate::CallFailure)
//! reason. Nothing else is returned from `analyze`.
//!
//! # Example
//!
//! ```ignore
//! async fn analyze(&self, prompt: &str, options: &AnalyzeOptions) -> Result<String> {
//!     let body = self.send(prompt, options).await
//!         .map_err(|e| CuecardError::call_failed(&self.key, e))?;
//!     // ... extract completion text
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::AnalyzeOptions;

/// Static description of an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// Display name (e.g. "Groq").
    pub name: String,
    /// Model identifier sent to the endpoint.
    pub model: String,
    /// Completion token cap used when the call does not set one.
    pub max_tokens: u32,
    /// Sampling temperature used when the call does not set one.
    pub temperature: f32,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            max_tokens: 4000,
            temperature: 0.7,
        }
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }
}

/// Uniform contract over one remote LLM endpoint.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Static descriptor for logging and introspection.
    fn info(&self) -> &ProviderInfo;

    /// Send `prompt` as a single user turn and return the completion text.
    ///
    /// `options` override the descriptor's temperature and token cap for
    /// this call only.
    async fn analyze(&self, prompt: &str, options: &AnalyzeOptions) -> Result<String>;
}
