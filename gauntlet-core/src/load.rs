// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Open-loop step-rate load generator.
//!
//! Dispatches operations on a fixed schedule regardless of prior completion
//! (open-loop model): a closed-loop generator under-counts achievable
//! throughput and masks backpressure, which is exactly the property under
//! test. Steps execute strictly sequentially; each step drains its
//! in-flight operations before the next one starts.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::TargetError;
use crate::executor::{execute, RetryPolicy};
use crate::outcome::{LoadStep, MeasurementSeries};
use crate::stats::SeriesSummary;
use crate::target::OperationReceipt;
use crate::types::TargetRate;

/// Error-rate line separating sustainable from saturated steps.
pub const ERROR_RATE_KNEE: f64 = 0.05;

/// One step of the load schedule.
#[derive(Debug, Clone, Copy)]
pub struct LoadStepSpec {
    pub rate: TargetRate,
    pub duration: Duration,
}

/// Completed load run: the executed steps plus derived rate metrics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoadTestReport {
    pub steps: Vec<LoadStep>,
}

impl LoadTestReport {
    /// First tested rate at which the error rate exceeded the 5% line.
    ///
    /// `None` means the tested grid never crossed the line: the knee is
    /// unknown, not absent.
    pub fn error_knee(&self) -> Option<TargetRate> {
        self.steps
            .iter()
            .find(|step| step.series.error_rate() > ERROR_RATE_KNEE)
            .map(|step| step.target_rate)
    }

    /// Highest tested rate whose error rate stayed within the 5% line.
    ///
    /// `None` when no tested step qualified; an untested higher rate is
    /// unknown and never reported as sustainable.
    pub fn sustainable_rate(&self) -> Option<TargetRate> {
        self.steps
            .iter()
            .filter(|step| step.series.error_rate() <= ERROR_RATE_KNEE)
            .max_by(|a, b| {
                a.target_rate
                    .ops_per_sec()
                    .total_cmp(&b.target_rate.ops_per_sec())
            })
            .map(|step| step.target_rate)
    }

    /// Latency summary over all steps combined.
    pub fn overall_summary(&self) -> SeriesSummary {
        let mut combined = MeasurementSeries::new();
        for step in &self.steps {
            for outcome in step.series.iter() {
                combined.record(outcome.clone());
            }
        }
        SeriesSummary::from_series(&combined)
    }
}

/// Step-rate load generator.
///
/// The scheduling loop never blocks on outstanding operations; every
/// dispatch is an independent task whose outcome is funneled back through
/// a channel in completion order.
#[derive(Debug)]
pub struct LoadGenerator {
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl LoadGenerator {
    /// Create a generator with the given per-operation retry policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Attach an overall-deadline token. Once cancelled, no new operations
    /// are dispatched; in-flight operations settle on their own timeouts.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run the full step schedule to completion.
    pub async fn run<F, Fut>(&self, steps: &[LoadStepSpec], op: F) -> LoadTestReport
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationReceipt, TargetError>> + Send + 'static,
    {
        let mut executed = Vec::with_capacity(steps.len());

        for spec in steps {
            if self.shutdown.is_cancelled() {
                tracing::info!("Deadline reached, skipping remaining load steps");
                break;
            }

            let step = self.run_step(*spec, op.clone()).await;
            tracing::info!(
                rate = %step.target_rate,
                dispatched = step.dispatched,
                completed = step.series.len(),
                success_rate = step.series.success_rate(),
                "Load step finished"
            );
            executed.push(step);
        }

        LoadTestReport { steps: executed }
    }

    /// Run one step: dispatch on the interval for the step duration, then
    /// wait for every in-flight operation to settle.
    async fn run_step<F, Fut>(&self, spec: LoadStepSpec, op: F) -> LoadStep
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationReceipt, TargetError>> + Send + 'static,
    {
        let started_at = Utc::now();
        let step_start = Instant::now();
        let mut ticker = interval(spec.rate.interval());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatched = 0u64;

        loop {
            if step_start.elapsed() >= spec.duration {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Deadline reached mid-step, stopping dispatch");
                    break;
                }
                _ = ticker.tick() => {
                    let tx = tx.clone();
                    let op = op.clone();
                    let policy = self.policy.clone();
                    tokio::spawn(async move {
                        let outcome = execute(op, &policy).await;
                        // Receiver dropping means the run was abandoned.
                        let _ = tx.send(outcome);
                    });
                    dispatched += 1;
                }
            }
        }

        // Drop the loop's sender so the channel closes once every
        // dispatched task has reported.
        drop(tx);

        let mut series = MeasurementSeries::new();
        while let Some(outcome) = rx.recv().await {
            series.record(outcome);
        }

        LoadStep {
            target_rate: spec.rate,
            duration: spec.duration,
            started_at,
            dispatched,
            series,
        }
    }
}
