//! Provider adapters and the registry that routes calls to them.
//!
//! - [`ProviderAdapter`]: the single-capability contract every endpoint implements
//! - [`OpenAiCompatClient`]: the adapter for Groq, DashScope and any other
//!   OpenAI-compatible endpoint
//! - [`RetryingAdapter`]: decorator retrying transient failures
//! - [`ProviderRegistry`]: active-provider selection and task-scoped delegation

pub mod openai_compat;
pub mod registry;
pub mod retry;
pub mod traits;

pub use openai_compat::{OpenAiCompatClient, Preset};
pub use registry::{CurrentProvider, ProviderDescriptor, ProviderRegistry, descriptors_from_config};
pub use retry::{RetryConfig, RetryingAdapter};
pub use traits::{ProviderAdapter, ProviderInfo};
