// Tool adapters - uniform async contracts over LLM-backed analyzers

//! # Tool Adapters Module
//!
//! Every tool in this module follows the same contract:
//!
//! - it enforces a timeout on the underlying model or service call,
//! - it returns structured errors with a kind tag instead of panicking,
//! - it emits a performance sample for every invocation,
//! - it is safe to call concurrently,
//! - when the model's output is unparseable it falls through to a documented
//!   deterministic fallback rather than failing the workflow node.
//!
//! Tool-specific behavior is parameterization plus prompt templates passed in
//! at construction; there is no inheritance hierarchy.

pub mod classification;
pub mod compliance;
pub mod llm;
pub mod playbooks;
pub mod prioritization;
pub mod response;
pub mod safety;

pub use classification::{ClassificationResult, IncidentClassifier};
pub use compliance::ComplianceChecker;
pub use llm::{HttpLlmClient, LlmClient, LlmRequest, ScriptedLlm};
pub use playbooks::{PlaybookSelection, PlaybookSelector};
pub use prioritization::{IncidentPrioritizer, PrioritizationResult};
pub use response::ResponseGenerator;
pub use safety::SafetyGuardrails;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

/// A performance sample emitted for every tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfSample {
    pub tool: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Collects performance samples from tools. The dispatcher drains the channel
/// into the persistent store's `performance_metrics` table.
#[derive(Clone)]
pub struct PerfSink {
    tx: mpsc::UnboundedSender<PerfSample>,
}

impl PerfSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PerfSample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink that drops every sample; used where metrics are not wired up.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn record(&self, tool: &str, started: Instant, success: bool, confidence: Option<f64>) {
        // A closed receiver just means nobody is collecting metrics anymore.
        let _ = self.tx.send(PerfSample {
            tool: tool.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            success,
            confidence,
            quality: None,
            timestamp: Utc::now(),
        });
    }
}

/// Token-bucket rate limiter, one per tool or destination system.
///
/// Buckets are process-local; when the engine is replicated horizontally the
/// external services' own quotas are the cross-process coordination point.
pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// A bucket allowing `per_minute` operations per minute, with burst up to
    /// the same amount.
    pub fn per_minute(per_minute: u32) -> Arc<Self> {
        Arc::new(Self {
            capacity: per_minute as f64,
            refill_per_second: per_minute as f64 / 60.0,
            state: Mutex::new(BucketState {
                tokens: per_minute as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Wait until a token is available, then consume it. This is a suspension
    /// point: callers yield instead of spinning.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
                state.last_refill = Instant::now();
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.refill_per_second,
                    ))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Consume a token only if one is immediately available.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = Instant::now();
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_exhausts_then_denies() {
        let limiter = RateLimiter::per_minute(2);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::per_minute(600); // 10/s so the test stays fast
        for _ in 0..600 {
            assert!(limiter.try_acquire().await);
        }
        let started = Instant::now();
        limiter.acquire().await;
        // One token refills in ~100ms at this rate
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn perf_sink_delivers_samples() {
        let (sink, mut rx) = PerfSink::new();
        sink.record("classification", Instant::now(), true, Some(0.9));
        let sample = rx.recv().await.unwrap();
        assert_eq!(sample.tool, "classification");
        assert!(sample.success);
        assert_eq!(sample.confidence, Some(0.9));
    }
}
