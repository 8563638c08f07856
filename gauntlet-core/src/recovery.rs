// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fault-recovery harness: crash/restart cycles with MTTR and exactly-once
//! measurement.
//!
//! Cycle lifecycle: Healthy → Crashed → Restarting → Verifying →
//! Healthy|Degraded. Cycles run strictly sequentially - crash-recovery
//! measurement requires isolating one fault at a time. A harness fault
//! aborts only the cycle it occurred in, never the run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, HarnessError};
use crate::executor::{execute_with_receipt, RetryPolicy};
use crate::outcome::RecoveryCycle;
use crate::target::{OperationParams, SystemUnderTest};
use crate::types::OperationId;

/// Cycle lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Target reachable and verified.
    Healthy,
    /// Crash injected; target disconnected.
    Crashed,
    /// Restart call in progress.
    Restarting,
    /// Post-restart verification in progress.
    Verifying,
    /// Verification or restart exhausted its budget.
    Degraded,
}

impl CyclePhase {
    /// Get the phase name for log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Crashed => "Crashed",
            Self::Restarting => "Restarting",
            Self::Verifying => "Verifying",
            Self::Degraded => "Degraded",
        }
    }

    /// Check if transition to the target phase is valid.
    pub fn can_transition_to(&self, target: CyclePhase) -> bool {
        matches!(
            (self, target),
            (Self::Healthy, Self::Crashed)
                | (Self::Crashed, Self::Restarting)
                | (Self::Restarting, Self::Verifying)
                | (Self::Restarting, Self::Degraded)
                | (Self::Verifying, Self::Healthy)
                | (Self::Verifying, Self::Degraded)
                // Verification retries resume from Degraded.
                | (Self::Degraded, Self::Verifying)
        )
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tracks one cycle's phase, logging every transition.
#[derive(Debug)]
struct CycleTracker {
    phase: CyclePhase,
}

impl CycleTracker {
    fn new() -> Self {
        Self {
            phase: CyclePhase::Healthy,
        }
    }

    fn advance(&mut self, target: CyclePhase) {
        debug_assert!(
            self.phase.can_transition_to(target),
            "invalid cycle transition {} -> {}",
            self.phase.name(),
            target.name()
        );
        tracing::debug!(from = self.phase.name(), to = target.name(), "Cycle phase transition");
        self.phase = target;
    }
}

/// Aggregate over all executed cycles.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    /// Cycles where the crash was injected while the target was idle.
    pub idle_cycles: Vec<RecoveryCycle>,
    /// Cycles where the crash was injected mid-operation. Kept separate
    /// because their failure semantics differ.
    pub mid_operation_cycles: Vec<RecoveryCycle>,
}

impl RecoveryReport {
    pub fn all_cycles(&self) -> impl Iterator<Item = &RecoveryCycle> {
        self.idle_cycles.iter().chain(self.mid_operation_cycles.iter())
    }

    /// Mean restart duration across all cycles. `None` when no cycle ran.
    pub fn avg_mttr(&self) -> Option<Duration> {
        let count = self.idle_cycles.len() + self.mid_operation_cycles.len();
        if count == 0 {
            return None;
        }
        let total: Duration = self.all_cycles().map(|c| c.mttr).sum();
        Some(total / count as u32)
    }

    /// AND over every cycle's exactly-once flag.
    pub fn exactly_once_completion(&self) -> bool {
        self.all_cycles().all(|c| c.exactly_once)
    }

    /// SUM of manual interventions across all cycles.
    pub fn total_manual_steps(&self) -> u32 {
        self.all_cycles().map(|c| c.manual_steps).sum()
    }

    /// MTTR in fractional milliseconds, for classification.
    pub fn avg_mttr_millis(&self) -> Option<f64> {
        self.avg_mttr().map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Outcome of one crash-and-restart sequence.
struct RestartOutcome {
    crashed_at: DateTime<Utc>,
    restarted_at: Option<DateTime<Utc>>,
    /// Duration of the restart effort only: settle delay and verification
    /// latency are excluded.
    mttr: Duration,
    ok: bool,
}

/// Orchestrates crash/restart cycles against a system under test.
#[derive(Debug, Clone)]
pub struct FaultRecoveryHarness {
    /// Cycles per phase (idle and mid-operation).
    pub cycles_per_phase: u32,
    /// Delay between crash injection and the restart call.
    pub settle_delay: Duration,
    /// Restart call budget per cycle.
    pub restart_attempts: u32,
    /// Verification operation budget per cycle.
    pub verify_attempts: u32,
    /// How long to wait for an in-flight operation to settle after restart
    /// before treating its outcome as indeterminate.
    pub resolve_timeout: Duration,
    /// Delay after dispatching the mid-operation workload before injecting
    /// the crash, so the operation is actually in flight.
    pub in_flight_delay: Duration,
    /// Policy for verification and re-issued operations.
    pub policy: RetryPolicy,
}

impl Default for FaultRecoveryHarness {
    fn default() -> Self {
        Self {
            cycles_per_phase: 3,
            settle_delay: Duration::from_secs(2),
            restart_attempts: 3,
            verify_attempts: 3,
            resolve_timeout: Duration::from_secs(5),
            in_flight_delay: Duration::from_millis(100),
            policy: RetryPolicy::default(),
        }
    }
}

impl FaultRecoveryHarness {
    /// Run both phases to completion.
    pub async fn run<T>(&self, target: Arc<T>) -> RecoveryReport
    where
        T: SystemUnderTest + 'static,
    {
        self.run_with_shutdown(target, &CancellationToken::new()).await
    }

    /// Run both phases, skipping remaining cycles once the shutdown token
    /// is cancelled. Cycles already in progress run to completion.
    pub async fn run_with_shutdown<T>(
        &self,
        target: Arc<T>,
        shutdown: &CancellationToken,
    ) -> RecoveryReport
    where
        T: SystemUnderTest + 'static,
    {
        let mut idle_cycles = Vec::with_capacity(self.cycles_per_phase as usize);
        for cycle in 0..self.cycles_per_phase {
            if shutdown.is_cancelled() {
                tracing::info!("Deadline reached, skipping remaining idle cycles");
                break;
            }
            tracing::info!(cycle, phase = "idle", "Starting recovery cycle");
            idle_cycles.push(self.run_idle_cycle(&target).await);
        }

        let mut mid_operation_cycles = Vec::with_capacity(self.cycles_per_phase as usize);
        for cycle in 0..self.cycles_per_phase {
            if shutdown.is_cancelled() {
                tracing::info!("Deadline reached, skipping remaining mid-operation cycles");
                break;
            }
            tracing::info!(cycle, phase = "mid_operation", "Starting recovery cycle");
            mid_operation_cycles.push(self.run_mid_operation_cycle(&target).await);
        }

        RecoveryReport {
            idle_cycles,
            mid_operation_cycles,
        }
    }

    /// One idle-phase cycle: crash while quiescent, restart, verify.
    pub async fn run_idle_cycle<T>(&self, target: &Arc<T>) -> RecoveryCycle
    where
        T: SystemUnderTest + 'static,
    {
        let mut tracker = CycleTracker::new();
        let mut manual_steps = 0u32;
        let operation_id = OperationId::generate();

        let restart = self
            .crash_and_restart(target.as_ref(), &mut tracker, &mut manual_steps)
            .await;

        if !restart.ok {
            return self.degraded_cycle(restart, manual_steps, operation_id);
        }

        tracker.advance(CyclePhase::Verifying);
        let completions = self
            .verify(target, operation_id, &mut tracker, &mut manual_steps)
            .await;

        RecoveryCycle {
            crashed_at: restart.crashed_at,
            restarted_at: restart.restarted_at,
            mttr: restart.mttr,
            manual_steps,
            exactly_once: completions == 1,
            operation_id,
            healthy: completions >= 1,
        }
    }

    /// One mid-operation-phase cycle: crash with an operation in flight,
    /// restart, resolve the in-flight operation, re-issue if needed.
    pub async fn run_mid_operation_cycle<T>(&self, target: &Arc<T>) -> RecoveryCycle
    where
        T: SystemUnderTest + 'static,
    {
        let mut tracker = CycleTracker::new();
        let mut manual_steps = 0u32;
        let operation_id = OperationId::generate();
        let params = OperationParams {
            operation_id,
            payload: serde_json::json!({ "kind": "mid_operation_workload" }),
        };

        // Put the workload in flight before injecting the crash.
        let in_flight_target = Arc::clone(target);
        let in_flight_params = params.clone();
        let mut in_flight = tokio::spawn(async move {
            in_flight_target.execute_operation(in_flight_params).await
        });
        sleep(self.in_flight_delay).await;

        let restart = self
            .crash_and_restart(target.as_ref(), &mut tracker, &mut manual_steps)
            .await;

        if !restart.ok {
            in_flight.abort();
            return self.degraded_cycle(restart, manual_steps, operation_id);
        }

        tracker.advance(CyclePhase::Verifying);
        let mut completions = 0u64;
        let mut still_in_flight = false;

        match timeout(self.resolve_timeout, &mut in_flight).await {
            Ok(Ok(Ok(receipt))) => {
                tracing::debug!(operation_id = %receipt.operation_id, "In-flight operation completed across crash");
                completions += 1;
            }
            Ok(Ok(Err(err))) => {
                let resolution = if err.kind == ErrorKind::Indeterminate {
                    "indeterminate"
                } else {
                    "failed"
                };
                tracing::debug!(kind = %err.kind, resolution, "In-flight operation did not complete");
            }
            Ok(Err(join_err)) => {
                tracing::warn!(
                    error = %HarnessError::TaskJoin { reason: join_err.to_string() },
                    "In-flight operation task lost; treating outcome as indeterminate"
                );
            }
            Err(_) => {
                tracing::debug!("In-flight operation still pending after restart; outcome indeterminate");
                still_in_flight = true;
            }
        }

        // Re-issue only when the operation did not observably complete;
        // re-issuing a completed operation would manufacture a duplicate.
        if completions == 0 {
            let reissued = self
                .issue_operation(target, params.clone())
                .await;
            if reissued {
                completions += 1;
            } else {
                manual_steps += 1;
            }
        }

        // A late completion of the original attempt is the duplicate window:
        // the logical operation may now have completed twice.
        if still_in_flight {
            match timeout(self.resolve_timeout, &mut in_flight).await {
                Ok(Ok(Ok(_))) => {
                    tracing::warn!(%operation_id, "Original attempt completed after re-issue");
                    completions += 1;
                }
                Err(_) => in_flight.abort(),
                _ => {}
            }
        }

        let healthy = completions >= 1;
        tracker.advance(if healthy {
            CyclePhase::Healthy
        } else {
            CyclePhase::Degraded
        });

        RecoveryCycle {
            crashed_at: restart.crashed_at,
            restarted_at: restart.restarted_at,
            mttr: restart.mttr,
            manual_steps,
            exactly_once: completions == 1,
            operation_id,
            healthy,
        }
    }

    /// Crash injection and restart: disconnect, settle, reconnect with a
    /// bounded attempt budget. MTTR covers the restart effort only.
    async fn crash_and_restart<T>(
        &self,
        target: &T,
        tracker: &mut CycleTracker,
        manual_steps: &mut u32,
    ) -> RestartOutcome
    where
        T: SystemUnderTest,
    {
        if let Err(err) = target.disconnect().await {
            let fault = HarnessError::Disconnect { last: err };
            tracing::warn!(error = %fault, "Crash injection failed; aborting cycle");
            return RestartOutcome {
                crashed_at: Utc::now(),
                restarted_at: None,
                mttr: Duration::ZERO,
                ok: false,
            };
        }
        *manual_steps += 1;
        let crashed_at = Utc::now();
        tracker.advance(CyclePhase::Crashed);

        sleep(self.settle_delay).await;
        tracker.advance(CyclePhase::Restarting);

        let restart_start = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            *manual_steps += 1;
            match target.connect().await {
                Ok(()) => {
                    let mttr = restart_start.elapsed();
                    tracing::info!(attempt, mttr_ms = mttr.as_millis() as u64, "Target restarted");
                    return RestartOutcome {
                        crashed_at,
                        restarted_at: Some(Utc::now()),
                        mttr,
                        ok: true,
                    };
                }
                Err(err) if attempt >= self.restart_attempts => {
                    let fault = HarnessError::Restart {
                        attempts: attempt,
                        last: err,
                    };
                    tracing::warn!(error = %fault, "Restart budget exhausted; aborting cycle");
                    tracker.advance(CyclePhase::Degraded);
                    return RestartOutcome {
                        crashed_at,
                        restarted_at: None,
                        mttr: restart_start.elapsed(),
                        ok: false,
                    };
                }
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "Restart attempt failed, retrying");
                }
            }
        }
    }

    /// Post-restart verification: bounded retries, counting observed
    /// completions for the cycle's logical operation.
    async fn verify<T>(
        &self,
        target: &Arc<T>,
        operation_id: OperationId,
        tracker: &mut CycleTracker,
        manual_steps: &mut u32,
    ) -> u64
    where
        T: SystemUnderTest + 'static,
    {
        let params = OperationParams {
            operation_id,
            payload: serde_json::json!({ "kind": "verification" }),
        };

        let mut completions = 0u64;
        for attempt in 1..=self.verify_attempts.max(1) {
            if self.issue_operation(target, params.clone()).await {
                completions += 1;
                tracker.advance(CyclePhase::Healthy);
                return completions;
            }

            tracker.advance(CyclePhase::Degraded);
            *manual_steps += 1;
            if attempt < self.verify_attempts.max(1) {
                tracker.advance(CyclePhase::Verifying);
            }
        }

        tracing::warn!(%operation_id, "Verification budget exhausted; cycle degraded");
        completions
    }

    /// Issue one operation through the executor; true when a terminal
    /// completion was observed.
    async fn issue_operation<T>(&self, target: &Arc<T>, params: OperationParams) -> bool
    where
        T: SystemUnderTest + 'static,
    {
        let target = Arc::clone(target);
        let op = move || {
            let target = Arc::clone(&target);
            let params = params.clone();
            async move { target.execute_operation(params).await }
        };
        let (_outcome, receipt) = execute_with_receipt(op, &self.policy).await;
        receipt.is_some()
    }

    fn degraded_cycle(
        &self,
        restart: RestartOutcome,
        manual_steps: u32,
        operation_id: OperationId,
    ) -> RecoveryCycle {
        RecoveryCycle {
            crashed_at: restart.crashed_at,
            restarted_at: restart.restarted_at,
            mttr: restart.mttr,
            manual_steps,
            exactly_once: false,
            operation_id,
            healthy: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Backoff;
    use crate::target::{ScriptedOutcome, ScriptedTarget};

    fn fast_harness() -> FaultRecoveryHarness {
        FaultRecoveryHarness {
            cycles_per_phase: 1,
            settle_delay: Duration::from_millis(50),
            restart_attempts: 3,
            verify_attempts: 3,
            resolve_timeout: Duration::from_secs(1),
            in_flight_delay: Duration::from_millis(10),
            policy: RetryPolicy {
                max_attempts: 2,
                per_attempt_timeout: Duration::from_millis(500),
                backoff: Backoff::None,
                retryable: |kind| kind.is_transient(),
            },
        }
    }

    #[test]
    fn test_transition_table() {
        assert!(CyclePhase::Healthy.can_transition_to(CyclePhase::Crashed));
        assert!(CyclePhase::Crashed.can_transition_to(CyclePhase::Restarting));
        assert!(CyclePhase::Restarting.can_transition_to(CyclePhase::Verifying));
        assert!(CyclePhase::Restarting.can_transition_to(CyclePhase::Degraded));
        assert!(CyclePhase::Verifying.can_transition_to(CyclePhase::Healthy));
        assert!(CyclePhase::Degraded.can_transition_to(CyclePhase::Verifying));

        assert!(!CyclePhase::Healthy.can_transition_to(CyclePhase::Verifying));
        assert!(!CyclePhase::Crashed.can_transition_to(CyclePhase::Healthy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_cycle_clean_recovery() {
        let target = Arc::new(ScriptedTarget::new([]));
        let harness = fast_harness();

        let cycle = harness.run_idle_cycle(&target).await;

        // Disconnect and connect each count as one manual step.
        assert_eq!(cycle.manual_steps, 2);
        assert!(cycle.healthy);
        assert!(cycle.exactly_once);
        assert!(cycle.restarted_at.is_some());
        // MTTR covers the restart call only, not settle or verification.
        assert!(cycle.mttr >= Duration::from_millis(20));
        assert!(cycle.mttr < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_cycle_verification_retry() {
        let target = Arc::new(ScriptedTarget::new([ScriptedOutcome::Fail {
            kind: ErrorKind::Validation,
            latency: Duration::ZERO,
        }]));
        let harness = fast_harness();

        let cycle = harness.run_idle_cycle(&target).await;

        // One failed verification adds one manual step on top of the
        // disconnect + connect pair.
        assert_eq!(cycle.manual_steps, 3);
        assert!(cycle.healthy);
        assert!(cycle.exactly_once);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_cycle_restart_budget_exhausted() {
        let target = Arc::new(ScriptedTarget::new([]));
        target.fail_next_connects(3);
        let harness = fast_harness();

        let cycle = harness.run_idle_cycle(&target).await;

        assert!(!cycle.healthy);
        assert!(!cycle.exactly_once);
        assert!(cycle.restarted_at.is_none());
        // Disconnect plus three failed restart attempts.
        assert_eq!(cycle.manual_steps, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_operation_completes_across_crash() {
        let target = Arc::new(ScriptedTarget::new([ScriptedOutcome::Hang {
            resume_after: Duration::from_millis(200),
        }]));
        let harness = fast_harness();

        let cycle = harness.run_mid_operation_cycle(&target).await;

        assert!(cycle.healthy);
        assert!(cycle.exactly_once);
        assert_eq!(target.completions(&cycle.operation_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_operation_failed_original_is_reissued() {
        let target = Arc::new(ScriptedTarget::new([ScriptedOutcome::Fail {
            kind: ErrorKind::Indeterminate,
            latency: Duration::from_millis(30),
        }]));
        let harness = fast_harness();

        let cycle = harness.run_mid_operation_cycle(&target).await;

        assert!(cycle.healthy);
        assert!(cycle.exactly_once);
        // Only the re-issue completed.
        assert_eq!(target.completions(&cycle.operation_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_operation_duplicate_completion_detected() {
        // Original hangs past the resolve timeout, so the harness re-issues;
        // the original then completes late.
        let target = Arc::new(ScriptedTarget::new([ScriptedOutcome::Hang {
            resume_after: Duration::from_millis(1500),
        }]));
        let harness = fast_harness();

        let cycle = harness.run_mid_operation_cycle(&target).await;

        assert!(!cycle.exactly_once, "duplicate completion must be a violation");
        assert!(cycle.healthy);
        assert_eq!(target.completions(&cycle.operation_id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_are_independent() {
        // First cycle cannot restart; the run must still execute the rest.
        let target = Arc::new(ScriptedTarget::new([]));
        target.fail_next_connects(3);
        let harness = FaultRecoveryHarness {
            cycles_per_phase: 2,
            ..fast_harness()
        };

        let report = harness.run(target.clone()).await;

        assert_eq!(report.idle_cycles.len(), 2);
        assert_eq!(report.mid_operation_cycles.len(), 2);
        assert!(!report.idle_cycles[0].healthy);
        assert!(report.idle_cycles[1].healthy);
        // One degraded cycle poisons the run-level exactly-once flag.
        assert!(!report.exactly_once_completion());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_aggregates() {
        let target = Arc::new(ScriptedTarget::new([]));
        let harness = fast_harness();

        let report = harness.run(target).await;

        assert_eq!(report.idle_cycles.len(), 1);
        assert_eq!(report.mid_operation_cycles.len(), 1);
        assert!(report.exactly_once_completion());
        assert_eq!(report.total_manual_steps(), 4);
        let avg = report.avg_mttr().unwrap();
        assert!(avg >= Duration::from_millis(20));
    }
}
