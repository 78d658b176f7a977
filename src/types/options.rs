//! Per-call options for adapter requests

use tokio_util::sync::CancellationToken;

/// Options for a single adapter call (provider-agnostic).
///
/// Unset fields fall back to the provider descriptor's defaults.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Best-effort cancellation. Adapters abandon the in-flight request when
    /// the token fires and fail with `CallFailure::Cancelled`.
    pub cancel: Option<CancellationToken>,
}

impl AnalyzeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
