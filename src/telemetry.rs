//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus); without
//! a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cuecard_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider key (e.g. "groq", "qwen")
//! - `status`: outcome: "ok" or "error"
//! - `match`: cache hit kind: "exact" or "fuzzy"
//! - `method`: compression path: "summarized" or "truncated"

/// Total adapter calls dispatched through the registry.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "cuecard_requests_total";

/// Adapter call duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "cuecard_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "cuecard_retries_total";

/// Total response cache hits.
///
/// Labels: `match` ("exact" | "fuzzy").
pub const CACHE_HITS_TOTAL: &str = "cuecard_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "cuecard_cache_misses_total";

/// Total entries evicted to respect the cache capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "cuecard_cache_evictions_total";

/// Total conversation buffers compressed.
///
/// Labels: `method` ("summarized" | "truncated").
pub const COMPRESSIONS_TOTAL: &str = "cuecard_compressions_total";
