// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Collection data model for benchmark measurements.
//!
//! Every record here is produced once by the component driving a test phase
//! and never mutated afterwards. Collections are single-writer during a
//! phase and become read-only by ownership transfer at phase end.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::types::{OperationId, TargetRate};

/// Result of one executor invocation, retries included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Wall-clock time the first attempt was issued.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the final attempt settled.
    pub finished_at: DateTime<Utc>,
    /// Total elapsed time including retries and backoff sleeps.
    pub latency: Duration,
    /// Whether any attempt produced a confirmed completion.
    pub success: bool,
    /// Classification of the final failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Number of attempts made (at least 1).
    pub attempts: u32,
}

impl OperationOutcome {
    /// Whether this outcome represents a failed operation.
    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// Ordered sequence of outcomes for one logical test phase.
///
/// Append order equals completion order, not dispatch order; callers must
/// not assume FIFO completion under concurrency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementSeries {
    outcomes: Vec<OperationOutcome>,
}

impl MeasurementSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed outcome. Only the phase-owning task calls this.
    pub fn record(&mut self, outcome: OperationOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter()
    }

    /// Number of successful outcomes.
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failed outcomes.
    pub fn failures(&self) -> usize {
        self.len() - self.successes()
    }

    /// Fraction of successful outcomes. Defined as 0 for an empty series,
    /// never NaN.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.successes() as f64 / self.len() as f64
    }

    /// Fraction of failed outcomes. Defined as 1 for an empty series so an
    /// empty step can never silently pass an error-rate gate.
    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Total latencies of all completed outcomes, in completion order.
    pub fn latencies(&self) -> Vec<Duration> {
        self.outcomes.iter().map(|o| o.latency).collect()
    }
}

/// One executed load step: target rate, configured duration, and the frozen
/// series of every outcome dispatched within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStep {
    pub target_rate: TargetRate,
    pub duration: Duration,
    /// Wall-clock time the step's dispatch window opened.
    pub started_at: DateTime<Utc>,
    /// Operations dispatched during the step window.
    pub dispatched: u64,
    pub series: MeasurementSeries,
}

impl LoadStep {
    /// Achieved completion rate over the step window, in ops/sec.
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.series.successes() as f64 / secs
    }
}

/// One crash/restart iteration of the fault-recovery harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryCycle {
    /// Wall-clock time the crash was injected.
    pub crashed_at: DateTime<Utc>,
    /// Wall-clock time the restart call returned, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restarted_at: Option<DateTime<Utc>>,
    /// Duration of the restart call only. Verification latency is excluded;
    /// conflating the two inflates MTTR.
    pub mttr: Duration,
    /// Operator interventions this cycle required (disconnect and connect
    /// each count as one, as does every extra restart or verification retry).
    pub manual_steps: u32,
    /// Whether exactly one terminal completion was observed for the cycle's
    /// logical operation. Duplicate completions are a violation, not a success.
    pub exactly_once: bool,
    pub operation_id: OperationId,
    /// Terminal phase the cycle settled in (`Healthy` or `Degraded`).
    pub healthy: bool,
}

/// One availability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryProbe {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

/// Classification of a criterion value against its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchStatus {
    Passed,
    Partial,
    Failed,
}

impl std::fmt::Display for BenchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchStatus::Passed => write!(f, "passed"),
            BenchStatus::Partial => write!(f, "partial"),
            BenchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal record for one benchmark criterion. Produced once by the result
/// classifier and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub criterion: String,
    pub unit: String,
    /// Measured value, absent when the run produced no data for this
    /// criterion. An unknown is reported as unknown, never as zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub status: BenchStatus,
    /// Raw evidence backing the value (series, cycles, probes).
    pub evidence: serde_json::Value,
}
