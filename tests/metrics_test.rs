//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use cuecard::cache::CacheMetadata;
use cuecard::providers::{ProviderAdapter, ProviderDescriptor, ProviderInfo, ProviderRegistry};
use cuecard::telemetry;
use cuecard::{
    AnalysisKind, AnalyzeOptions, CacheConfig, CallFailure, Cuecard, CuecardError, ResponseCache,
    Result, RetryConfig,
};

// ============================================================================
// Mock adapters
// ============================================================================

struct FixedAdapter {
    info: ProviderInfo,
    reply: String,
}

impl FixedAdapter {
    fn new(name: &str, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            info: ProviderInfo::new(name, "m"),
            reply: reply.into(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FixedAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn analyze(&self, _prompt: &str, _options: &AnalyzeOptions) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Fails with a rate limit `failures` times, then succeeds.
struct FlakyAdapter {
    info: ProviderInfo,
    failures: AtomicU32,
}

#[async_trait]
impl ProviderAdapter for FlakyAdapter {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn analyze(&self, _prompt: &str, _options: &AnalyzeOptions) -> Result<String> {
        if self.failures.load(Ordering::Relaxed) > 0 {
            self.failures.fetch_sub(1, Ordering::Relaxed);
            return Err(CuecardError::call_failed(
                "flaky",
                CallFailure::RateLimited { retry_after: None },
            ));
        }
        Ok("ok".into())
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_where(snapshot, name, |_| true)
}

/// Sum counter values for `name` carrying the label `label=value`.
fn counter_labelled(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    counter_where(snapshot, name, |key| {
        key.key()
            .labels()
            .any(|l| l.key() == label && l.value() == value)
    })
}

fn counter_where(
    snapshot: &SnapshotVec,
    name: &str,
    filter: impl Fn(&metrics_util::CompositeKey) -> bool,
) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter && key.key().name() == name && filter(key)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Run `fut` with `recorder` installed as the thread-local recorder.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the async work.
fn recorded<F: std::future::Future>(recorder: &DebuggingRecorder, fut: F) -> F::Output {
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    })
}

// ============================================================================
// Provider requests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_request_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, async {
        let registry = ProviderRegistry::new(
            "fast",
            [ProviderDescriptor::new("fast", FixedAdapter::new("fast", "ok"))],
        )?;
        registry.analyze("hello", &AnalyzeOptions::new()).await
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_labelled(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert_eq!(
        counter_labelled(&snapshot, telemetry::REQUESTS_TOTAL, "provider", "fast"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn exhausted_retries_record_error_and_retry_counts() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, async {
        let flaky = Arc::new(FlakyAdapter {
            info: ProviderInfo::new("flaky", "m"),
            failures: AtomicU32::new(10),
        });
        let retry = RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1));
        let registry = ProviderRegistry::new(
            "flaky",
            [ProviderDescriptor::new("flaky", flaky).with_retry(retry)],
        )?;
        registry.analyze("hello", &AnalyzeOptions::new()).await
    });
    assert!(result.is_err());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(
        counter_labelled(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn delegated_request_is_counted_under_its_provider() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, async {
        let registry = ProviderRegistry::new(
            "fast",
            [
                ProviderDescriptor::new("fast", FixedAdapter::new("fast", "a")),
                ProviderDescriptor::new("slow", FixedAdapter::new("slow", "b")),
            ],
        )?;
        registry
            .analyze_with_provider("slow", "hello", &AnalyzeOptions::new())
            .await
    });
    assert_eq!(result.unwrap(), "b");

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_labelled(&snapshot, telemetry::REQUESTS_TOTAL, "provider", "slow"),
        1
    );
    assert_eq!(
        counter_labelled(&snapshot, telemetry::REQUESTS_TOTAL, "provider", "fast"),
        0
    );
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn cache_records_hits_misses_and_evictions() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let cache = ResponseCache::new(CacheConfig::new().max_entries(1));
        let meta = || CacheMetadata::new(AnalysisKind::ConversationOnly, 10);

        assert!(cache.find_similar("Explain X").is_none());
        cache.store("Explain X", "x", meta());
        assert!(cache.find_similar("Explain X").is_some());
        assert!(cache.find_similar("explain   x").is_some());
        cache.store("What is a hash map?", "y", meta());
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_labelled(&snapshot, telemetry::CACHE_HITS_TOTAL, "match", "exact"),
        2
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_EVICTIONS_TOTAL), 1);
}

// ============================================================================
// Compression
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn compression_records_method() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, async {
        let analyzer = Cuecard::builder()
            .adapter("qwen", FixedAdapter::new("qwen", "answer"))
            .adapter("groq", FixedAdapter::new("groq", "summary ".repeat(20)))
            .default_provider("qwen")
            .build()?;
        Ok::<_, CuecardError>(analyzer.analyze(&"talk ".repeat(400), None, false).await)
    });
    assert!(result.unwrap().success);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_labelled(&snapshot, telemetry::COMPRESSIONS_TOTAL, "method", "summarized"),
        1
    );
    // summary call plus the main analysis
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let registry = ProviderRegistry::new(
        "fast",
        [ProviderDescriptor::new("fast", FixedAdapter::new("fast", "ok"))],
    )
    .unwrap();
    registry.analyze("hello", &AnalyzeOptions::new()).await.unwrap();
}
