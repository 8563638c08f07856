// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Retrying operation executor.
//!
//! Wraps one unit of work against the system under test with a per-attempt
//! timeout, transient-error retry, and latency timestamping. `execute`
//! never returns an error: failure is always represented as `success =
//! false` in the outcome, so callers treat every call uniformly.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout, Instant};

use crate::error::{ErrorKind, TargetError};
use crate::outcome::OperationOutcome;
use crate::target::OperationReceipt;

/// Backoff ceiling for the default exponential strategy.
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(15);

/// Delay strategy between retry attempts.
///
/// Delays are monotonically non-decreasing in the attempt number, so the
/// total wall-clock time of one `execute` call stays bounded by
/// `per_attempt_timeout * max_attempts + sum(backoff)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Fixed delay between attempts.
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped.
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay to sleep after the given completed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base, cap } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let delay = base.saturating_mul(1u32 << exponent);
                delay.min(*cap)
            }
        }
    }
}

/// Policy governing one executor invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Timeout applied to each individual attempt.
    pub per_attempt_timeout: Duration,
    pub backoff: Backoff,
    /// Whether a failure of the given kind may be retried.
    pub retryable: fn(ErrorKind) -> bool,
}

impl RetryPolicy {
    /// Single best-effort attempt with a bounded timeout. Used by the
    /// canary prober.
    pub fn no_retry(per_attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            per_attempt_timeout,
            backoff: Backoff::None,
            retryable: |_| false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(30),
            backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
                cap: DEFAULT_BACKOFF_CAP,
            },
            retryable: |kind| kind.is_transient(),
        }
    }
}

/// Execute one operation under the given retry policy.
///
/// Total elapsed latency includes every retry and backoff sleep.
pub async fn execute<F, Fut>(op: F, policy: &RetryPolicy) -> OperationOutcome
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<OperationReceipt, TargetError>>,
{
    let (outcome, _receipt) = execute_with_receipt(op, policy).await;
    outcome
}

/// Like [`execute`], additionally returning the receipt of the successful
/// attempt. The fault-recovery harness uses the receipt for exactly-once
/// accounting.
pub async fn execute_with_receipt<F, Fut>(
    op: F,
    policy: &RetryPolicy,
) -> (OperationOutcome, Option<OperationReceipt>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<OperationReceipt, TargetError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let started_at = Utc::now();
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let kind = match timeout(policy.per_attempt_timeout, op()).await {
            Ok(Ok(receipt)) => {
                let outcome = OperationOutcome {
                    started_at,
                    finished_at: Utc::now(),
                    latency: start.elapsed(),
                    success: true,
                    error_kind: None,
                    attempts,
                };
                return (outcome, Some(receipt));
            }
            Ok(Err(err)) => {
                tracing::debug!(kind = %err.kind, attempt = attempts, "Operation attempt failed");
                err.kind
            }
            Err(_) => {
                tracing::debug!(attempt = attempts, "Operation attempt timed out");
                ErrorKind::Timeout
            }
        };

        if attempts >= max_attempts || !(policy.retryable)(kind) {
            let outcome = OperationOutcome {
                started_at,
                finished_at: Utc::now(),
                latency: start.elapsed(),
                success: false,
                error_kind: Some(kind),
                attempts,
            };
            return (outcome, None);
        }

        sleep(policy.backoff.delay(attempts)).await;
    }
}
