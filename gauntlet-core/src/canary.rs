// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Canary/availability prober.
//!
//! Issues a low-frequency synthetic operation over a bounded window. Each
//! probe is a single best-effort attempt with a bounded timeout; a failed
//! probe raises an alert synchronously so operators get a near-real-time
//! signal rather than a batched report.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::TargetError;
use crate::executor::{execute, RetryPolicy};
use crate::outcome::CanaryProbe;
use crate::target::OperationReceipt;

/// Completed canary run.
#[derive(Debug, Clone, Serialize)]
pub struct CanaryReport {
    pub interval: Duration,
    pub window: Duration,
    pub probes: Vec<CanaryProbe>,
    /// Alerts emitted during the run (one per failed probe).
    pub alerts: u32,
}

impl CanaryReport {
    pub fn failures(&self) -> usize {
        self.probes.iter().filter(|p| !p.success).count()
    }

    /// Fraction of successful probes. 0 for an empty run, never NaN.
    pub fn success_ratio(&self) -> f64 {
        if self.probes.is_empty() {
            return 0.0;
        }
        let successes = self.probes.len() - self.failures();
        successes as f64 / self.probes.len() as f64
    }

    /// Mean time between failures over the window.
    pub fn mtbf(&self) -> Duration {
        let failures = self.failures().max(1) as u32;
        self.window / failures
    }

    /// Mean gap between a failure probe and the next success probe:
    /// recovery as observed externally. `None` when no failure was
    /// followed by a success.
    pub fn mttr(&self) -> Option<Duration> {
        let mut gaps = Vec::new();

        for (i, probe) in self.probes.iter().enumerate() {
            if probe.success {
                continue;
            }
            if let Some(next_success) = self.probes[i + 1..].iter().find(|p| p.success) {
                let gap = next_success
                    .timestamp
                    .signed_duration_since(probe.timestamp)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                gaps.push(gap);
            }
        }

        if gaps.is_empty() {
            return None;
        }
        let total: Duration = gaps.iter().sum();
        Some(total / gaps.len() as u32)
    }
}

/// Fixed-interval availability prober.
#[derive(Debug, Clone)]
pub struct CanaryProber {
    pub interval: Duration,
    pub window: Duration,
    /// Timeout for each single-attempt probe.
    pub probe_timeout: Duration,
}

impl CanaryProber {
    pub fn new(interval: Duration, window: Duration, probe_timeout: Duration) -> Self {
        Self {
            interval,
            window,
            probe_timeout,
        }
    }

    /// Run probes until the window closes. `on_alert` fires synchronously
    /// for every failed probe, at the time of failure.
    pub async fn run<F, Fut, A>(&self, op: F, on_alert: A) -> CanaryReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<OperationReceipt, TargetError>>,
        A: FnMut(&CanaryProbe),
    {
        self.run_with_shutdown(op, on_alert, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), stopping early once the shutdown token is
    /// cancelled. No new probes are issued after cancellation.
    pub async fn run_with_shutdown<F, Fut, A>(
        &self,
        op: F,
        mut on_alert: A,
        shutdown: &CancellationToken,
    ) -> CanaryReport
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<OperationReceipt, TargetError>>,
        A: FnMut(&CanaryProbe),
    {
        let policy = RetryPolicy::no_retry(self.probe_timeout);
        let start = Instant::now();
        let mut ticker = interval(self.interval);
        let mut probes = Vec::new();
        let mut alerts = 0u32;

        loop {
            if start.elapsed() >= self.window || shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Deadline reached, stopping canary probes");
                    break;
                }
                _ = ticker.tick() => {}
            }
            if start.elapsed() >= self.window {
                break;
            }

            let outcome = execute(&op, &policy).await;
            let probe = CanaryProbe {
                timestamp: outcome.started_at,
                success: outcome.success,
                latency: outcome.latency,
                error: outcome.error_kind,
            };

            if !probe.success {
                alerts += 1;
                tracing::warn!(
                    kind = ?probe.error,
                    latency_ms = probe.latency.as_millis() as u64,
                    "Canary probe failed"
                );
                on_alert(&probe);
            } else {
                tracing::debug!(
                    latency_ms = probe.latency.as_millis() as u64,
                    "Canary probe succeeded"
                );
            }

            probes.push(probe);
        }

        CanaryReport {
            interval: self.interval,
            window: self.window,
            probes,
            alerts,
        }
    }
}
