//! Provider Usage Metrics
//!
//! Process-wide counters for text-intelligence calls: how many, how many
//! tokens, how long, and how many failed, broken down by stage. Thread-safe
//! for concurrent cell pipelines.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;

use crate::ai::provider::LlmResponse;

// =============================================================================
// Metrics Collector
// =============================================================================

/// Thread-safe usage collector.
///
/// Atomics for the totals; a small RwLock-guarded table for per-stage rows.
pub struct UsageMetrics {
    start_time: Instant,
    api_calls: AtomicU32,
    failures: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    stages: RwLock<Vec<StageMetrics>>,
}

/// Counters for one stage (`classify`, `summarize`, `suggest`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageMetrics {
    pub stage: String,
    pub calls: u32,
    pub failures: u32,
    pub tokens: u64,
    pub latency_ms: u64,
}

/// Point-in-time view of the collector
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub uptime_ms: u64,
    pub api_calls: u32,
    pub failures: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub stages: Vec<StageMetrics>,
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            stages: RwLock::new(Vec::new()),
        }
    }

    /// Record a successful provider response for `stage`
    pub fn record_response(&self, stage: &str, response: &LlmResponse) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(response.usage.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(response.usage.output_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(response.timing.total_ms, Ordering::Relaxed);

        self.with_stage(stage, |row| {
            row.calls += 1;
            row.tokens += response.usage.total() as u64;
            row.latency_ms += response.timing.total_ms;
        });
    }

    /// Record a failed call (provider error or contract violation) for `stage`
    pub fn record_failure(&self, stage: &str) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.with_stage(stage, |row| {
            row.calls += 1;
            row.failures += 1;
        });
    }

    fn with_stage(&self, stage: &str, update: impl FnOnce(&mut StageMetrics)) {
        let mut stages = self.stages.write().unwrap_or_else(|poisoned| {
            tracing::error!("Usage metrics RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        match stages.iter_mut().find(|s| s.stage == stage) {
            Some(row) => update(row),
            None => {
                let mut row = StageMetrics {
                    stage: stage.to_string(),
                    ..Default::default()
                };
                update(&mut row);
                stages.push(row);
            }
        }
    }

    pub fn snapshot(&self) -> UsageSummary {
        let api_calls = self.api_calls.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let input_tokens = self.input_tokens.load(Ordering::Relaxed);
        let output_tokens = self.output_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let succeeded = api_calls.saturating_sub(failures);
        let avg_latency = if succeeded > 0 {
            total_latency as f64 / succeeded as f64
        } else {
            0.0
        };

        let stages = self
            .stages
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Usage metrics RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .clone();

        UsageSummary {
            uptime_ms: self.start_time.elapsed().as_millis() as u64,
            api_calls,
            failures,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            avg_latency_ms: avg_latency,
            stages,
        }
    }
}

impl UsageSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        format!(
            "API Calls: {} ({} failed)\n\
             Tokens: {} (input: {}, output: {})\n\
             Avg Latency: {:.0}ms",
            self.api_calls,
            self.failures,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.avg_latency_ms,
        )
    }
}

/// Shared collector handed to every intelligence client
pub type SharedMetrics = Arc<UsageMetrics>;

pub fn create_shared_metrics() -> SharedMetrics {
    Arc::new(UsageMetrics::new())
}
