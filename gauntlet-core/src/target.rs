// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The capability interface every concrete benchmark target implements,
//! plus a deterministic scripted implementation for tests and demos.
//!
//! The engine never subscribes to adapter events; it awaits results
//! directly, which keeps all state owned by the calling phase.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ErrorKind, TargetError};
use crate::types::OperationId;

/// Parameters for one logical operation.
///
/// The payload is opaque to the engine; adapters interpret it. The id is
/// the engine's handle for exactly-once accounting across retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationParams {
    pub operation_id: OperationId,
    pub payload: serde_json::Value,
}

impl OperationParams {
    /// Create params for a fresh logical operation.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            operation_id: OperationId::generate(),
            payload,
        }
    }
}

/// Confirmation of one terminal completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub operation_id: OperationId,
    pub confirmed_at: DateTime<Utc>,
    pub detail: serde_json::Value,
}

impl OperationReceipt {
    pub fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            confirmed_at: Utc::now(),
            detail: serde_json::Value::Null,
        }
    }
}

/// Capability interface for a system under test.
///
/// Environment configuration (endpoints, credentials) is resolved entirely
/// outside the engine; implementations receive it at construction time.
/// Process-level crash/restart is the implementation's concern; the engine
/// only measures elapsed time around these calls.
pub trait SystemUnderTest: Send + Sync {
    /// Establish connectivity. Called by the recovery harness as the
    /// "restart" step of a crash cycle.
    fn connect(&self) -> impl Future<Output = Result<(), TargetError>> + Send;

    /// Tear down connectivity. Called by the recovery harness as the
    /// injected "crash".
    fn disconnect(&self) -> impl Future<Output = Result<(), TargetError>> + Send;

    /// Perform one unit of work.
    fn execute_operation(
        &self,
        params: OperationParams,
    ) -> impl Future<Output = Result<OperationReceipt, TargetError>> + Send;

    /// Cheap liveness probe.
    fn health_check(&self) -> impl Future<Output = Result<bool, TargetError>> + Send;
}

/// One scripted response from the simulated target.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Complete successfully after the given simulated latency.
    Succeed { latency: Duration },
    /// Fail with the given kind after the given simulated latency.
    Fail { kind: ErrorKind, latency: Duration },
    /// Stall for the given delay, then complete successfully. Used to put
    /// an operation in flight across a crash injection.
    Hang { resume_after: Duration },
}

/// Deterministic `SystemUnderTest` driven by an explicit outcome script.
///
/// Replaces random stand-ins with injectable fixtures: each call to
/// `execute_operation` consumes the next scripted outcome, falling back to
/// an immediate success once the script is exhausted. Completions are
/// counted per logical operation so tests can assert exactly-once behavior.
#[derive(Debug)]
pub struct ScriptedTarget {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    connected: AtomicBool,
    /// Next N connect calls fail with a connection error.
    connect_failures: AtomicU32,
    /// Simulated duration of a successful connect call.
    connect_delay: Duration,
    /// Latency of the fallback success once the script is exhausted.
    fallback_latency: Duration,
    completions: DashMap<OperationId, u64>,
}

impl ScriptedTarget {
    /// Create a target with the given outcome script.
    pub fn new(script: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            connected: AtomicBool::new(true),
            connect_failures: AtomicU32::new(0),
            connect_delay: Duration::from_millis(20),
            fallback_latency: Duration::from_millis(1),
            completions: DashMap::new(),
        }
    }

    /// Create a target that always succeeds with the given latency.
    pub fn always_healthy(latency: Duration) -> Self {
        let mut target = Self::new([]);
        target.fallback_latency = latency;
        target
    }

    /// Set the simulated duration of a successful connect call.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Make the next `n` connect calls fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Number of terminal completions observed for a logical operation.
    pub fn completions(&self, id: &OperationId) -> u64 {
        self.completions.get(id).map(|c| *c).unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn next_outcome(&self) -> ScriptedOutcome {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(ScriptedOutcome::Succeed {
                latency: self.fallback_latency,
            })
    }
}

impl SystemUnderTest for ScriptedTarget {
    async fn connect(&self) -> Result<(), TargetError> {
        loop {
            let remaining = self.connect_failures.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .connect_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(TargetError::connection("simulated connect failure"));
            }
        }

        tokio::time::sleep(self.connect_delay).await;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TargetError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn execute_operation(
        &self,
        params: OperationParams,
    ) -> Result<OperationReceipt, TargetError> {
        if !self.is_connected() {
            return Err(TargetError::connection("target is disconnected"));
        }

        match self.next_outcome().await {
            ScriptedOutcome::Succeed { latency } => {
                tokio::time::sleep(latency).await;
                *self.completions.entry(params.operation_id).or_insert(0) += 1;
                Ok(OperationReceipt::new(params.operation_id))
            }
            ScriptedOutcome::Fail { kind, latency } => {
                tokio::time::sleep(latency).await;
                Err(TargetError::new(kind, "scripted failure"))
            }
            ScriptedOutcome::Hang { resume_after } => {
                tokio::time::sleep(resume_after).await;
                *self.completions.entry(params.operation_id).or_insert(0) += 1;
                Ok(OperationReceipt::new(params.operation_id))
            }
        }
    }

    async fn health_check(&self) -> Result<bool, TargetError> {
        Ok(self.is_connected())
    }
}
