// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark run orchestration.
//!
//! One entry point per criterion family: the load generator feeds the
//! throughput and latency criteria, the fault-recovery harness feeds MTTR,
//! and the canary prober feeds availability. Every entry point returns the
//! classified result together with the raw evidence that produced it, and
//! a run always completes with a result - possibly `failed` - never an
//! unhandled crash of the harness itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::canary::CanaryReport;
use crate::config::SuiteConfig;
use crate::error::TargetError;
use crate::load::{LoadGenerator, LoadTestReport};
use crate::outcome::BenchmarkResult;
use crate::recovery::RecoveryReport;
use crate::target::{OperationParams, OperationReceipt, SystemUnderTest};

/// Well-known criterion names. A suite configures the subset it cares
/// about; components only run when one of their criteria is present.
pub const CRITERION_SUSTAINABLE_THROUGHPUT: &str = "sustainable_throughput";
pub const CRITERION_P95_LATENCY: &str = "p95_latency";
pub const CRITERION_RECOVERY_MTTR: &str = "recovery_mttr";
pub const CRITERION_AVAILABILITY: &str = "availability";

type BoxedOpFuture = Pin<Box<dyn Future<Output = Result<OperationReceipt, TargetError>> + Send>>;

/// Completed suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BenchmarkResult>,
}

/// Drives a configured suite against one system under test.
#[derive(Debug)]
pub struct BenchmarkRunner {
    config: SuiteConfig,
    deadline: CancellationToken,
}

impl BenchmarkRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            deadline: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Token cancelled when the overall deadline expires. In-flight
    /// operations settle on their own timeouts; nothing new is dispatched.
    pub fn deadline_token(&self) -> CancellationToken {
        self.deadline.clone()
    }

    fn arm_deadline(&self) {
        if let Some(deadline) = self.config.deadline {
            let token = self.deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(deadline_secs = deadline.as_secs(), "Run deadline expired");
                token.cancel();
            });
        }
    }

    /// Run the load schedule; classify throughput and latency criteria.
    pub async fn run_load<T>(&self, target: Arc<T>) -> (Vec<BenchmarkResult>, LoadTestReport)
    where
        T: SystemUnderTest + 'static,
    {
        let generator =
            LoadGenerator::new(self.config.retry.clone()).with_shutdown(self.deadline.clone());
        let report = generator.run(&self.config.load_steps, workload_op(target)).await;

        let evidence = serde_json::to_value(&report).unwrap_or_default();
        let mut results = Vec::new();

        if let Some(criterion) = self.config.criterion(CRITERION_SUSTAINABLE_THROUGHPUT) {
            let value = report.sustainable_rate().map(|r| r.ops_per_sec());
            results.push(criterion.result(value, evidence.clone()));
        }

        if let Some(criterion) = self.config.criterion(CRITERION_P95_LATENCY) {
            let summary = report.overall_summary();
            results.push(criterion.result(summary.p95_millis(), evidence.clone()));
        }

        (results, report)
    }

    /// Run crash/restart cycles; classify the MTTR criterion.
    pub async fn run_recovery<T>(&self, target: Arc<T>) -> (Option<BenchmarkResult>, RecoveryReport)
    where
        T: SystemUnderTest + 'static,
    {
        let report = self
            .config
            .recovery
            .run_with_shutdown(target, &self.deadline)
            .await;

        let result = self.config.criterion(CRITERION_RECOVERY_MTTR).map(|criterion| {
            let evidence = serde_json::to_value(&report).unwrap_or_default();
            criterion.result(report.avg_mttr_millis(), evidence)
        });

        (result, report)
    }

    /// Run the canary window; classify the availability criterion.
    /// `on_alert` fires synchronously for every failed probe.
    pub async fn run_canary<T, A>(
        &self,
        target: Arc<T>,
        on_alert: A,
    ) -> (Option<BenchmarkResult>, CanaryReport)
    where
        T: SystemUnderTest + 'static,
        A: FnMut(&crate::outcome::CanaryProbe),
    {
        let report = self
            .config
            .canary
            .run_with_shutdown(workload_op(target), on_alert, &self.deadline)
            .await;

        let result = self.config.criterion(CRITERION_AVAILABILITY).map(|criterion| {
            let evidence = serde_json::to_value(&report).unwrap_or_default();
            let value = if report.probes.is_empty() {
                None
            } else {
                Some(report.success_ratio())
            };
            criterion.result(value, evidence)
        });

        (result, report)
    }

    /// Run every component with a configured criterion, in order: load,
    /// recovery, canary.
    pub async fn run_suite<T>(&self, target: Arc<T>) -> SuiteReport
    where
        T: SystemUnderTest + 'static,
    {
        self.arm_deadline();
        let started_at = Utc::now();
        let mut results = Vec::new();

        let wants_load = self.config.criterion(CRITERION_SUSTAINABLE_THROUGHPUT).is_some()
            || self.config.criterion(CRITERION_P95_LATENCY).is_some();
        if wants_load {
            let (load_results, report) = self.run_load(target.clone()).await;
            let summary = report.overall_summary();
            tracing::info!(
                steps = report.steps.len(),
                p95 = ?summary.p95,
                "Load phase complete"
            );
            results.extend(load_results);
        }

        if self.config.criterion(CRITERION_RECOVERY_MTTR).is_some() {
            let (result, report) = self.run_recovery(target.clone()).await;
            tracing::info!(
                cycles = report.idle_cycles.len() + report.mid_operation_cycles.len(),
                exactly_once = report.exactly_once_completion(),
                "Recovery phase complete"
            );
            results.extend(result);
        }

        if self.config.criterion(CRITERION_AVAILABILITY).is_some() {
            let (result, report) = self.run_canary(target, |_| {}).await;
            tracing::info!(
                probes = report.probes.len(),
                alerts = report.alerts,
                "Canary phase complete"
            );
            results.extend(result);
        }

        SuiteReport {
            suite: self.config.suite.clone(),
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }
}

/// Build the dispatchable workload closure for a target. Each invocation
/// issues a fresh logical operation.
fn workload_op<T>(
    target: Arc<T>,
) -> impl Fn() -> BoxedOpFuture + Clone + Send + Sync + 'static
where
    T: SystemUnderTest + 'static,
{
    move || {
        let target = target.clone();
        Box::pin(async move {
            target
                .execute_operation(OperationParams::new(serde_json::json!({
                    "kind": "workload"
                })))
                .await
        }) as BoxedOpFuture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::outcome::BenchStatus;
    use crate::target::ScriptedTarget;

    fn suite_config() -> SuiteConfig {
        SuiteConfig::load_string(
            r#"
suite: runner-test

retry:
  max_attempts: 1
  per_attempt_timeout_ms: 1000

load_steps:
  - rate: 5.0
    duration_secs: 1

recovery:
  cycles_per_phase: 1
  settle_delay_ms: 50
  resolve_timeout_ms: 500

canary:
  interval_secs: 1
  window_secs: 3
  probe_timeout_ms: 500

criteria:
  - name: sustainable_throughput
    unit: ops/s
    direction: higher_is_better
    passed: 1.0
    partial: 0.5
  - name: p95_latency
    unit: ms
    direction: lower_is_better
    passed: 1000.0
    partial: 5000.0
  - name: recovery_mttr
    unit: ms
    direction: lower_is_better
    passed: 1000.0
    partial: 5000.0
  - name: availability
    unit: ratio
    direction: higher_is_better
    passed: 0.99
    partial: 0.9
"#,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_suite_produces_all_configured_results() {
        let target = Arc::new(ScriptedTarget::always_healthy(Duration::from_millis(2)));
        let runner = BenchmarkRunner::new(suite_config());

        let report = runner.run_suite(target).await;

        assert_eq!(report.results.len(), 4);
        for result in &report.results {
            assert_eq!(
                result.status,
                BenchStatus::Passed,
                "criterion {} did not pass",
                result.criterion
            );
            assert!(result.value.is_some());
        }
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_still_produces_results() {
        let target = Arc::new(ScriptedTarget::always_healthy(Duration::from_millis(2)));
        let runner = BenchmarkRunner::new(suite_config());
        runner.deadline_token().cancel();

        let (results, report) = runner.run_load(target).await;

        // Nothing was dispatched, so the value is unknown and the
        // criterion fails rather than silently passing.
        assert!(report.steps.is_empty());
        assert_eq!(results.len(), 2);
        for result in results {
            assert_eq!(result.status, BenchStatus::Failed);
            assert_eq!(result.value, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_criteria_skip_components() {
        let config = SuiteConfig::load_string(
            r#"
suite: load-only
load_steps:
  - rate: 5.0
    duration_secs: 1
criteria:
  - name: sustainable_throughput
    unit: ops/s
    direction: higher_is_better
    passed: 1.0
    partial: 0.5
"#,
        )
        .unwrap();
        let target = Arc::new(ScriptedTarget::always_healthy(Duration::from_millis(1)));
        let runner = BenchmarkRunner::new(config);

        let report = runner.run_suite(target).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].criterion, CRITERION_SUSTAINABLE_THROUGHPUT);
    }
}
