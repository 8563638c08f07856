// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigValidationError;

/// Maximum allowed dispatch rate: 10,000 ops/sec.
/// Above this the interval timer resolution dominates the measurement.
const MAX_TARGET_RATE: f64 = 10_000.0;

/// Validated target dispatch rate in operations per second.
/// Must be finite and in range (0, 10000].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TargetRate(f64);

impl TargetRate {
    /// Create a new TargetRate with validation.
    pub fn new(ops_per_sec: f64) -> Result<Self, ConfigValidationError> {
        if !ops_per_sec.is_finite() || ops_per_sec <= 0.0 {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "target_rate",
                value: format!("{}", ops_per_sec),
                reason: "Rate must be a finite value greater than zero".to_string(),
            });
        }

        if ops_per_sec > MAX_TARGET_RATE {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "target_rate",
                value: format!("{}", ops_per_sec),
                reason: format!("Rate exceeds maximum of {} ops/sec", MAX_TARGET_RATE),
            });
        }

        Ok(Self(ops_per_sec))
    }

    /// Get the rate in operations per second.
    pub fn ops_per_sec(&self) -> f64 {
        self.0
    }

    /// Dispatch interval for an open-loop generator at this rate.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.0)
    }
}

impl fmt::Display for TargetRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ops/s", self.0)
    }
}

impl TryFrom<f64> for TargetRate {
    type Error = ConfigValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetRate> for f64 {
    fn from(rate: TargetRate) -> Self {
        rate.0
    }
}

/// Identity of one logical operation against the system under test.
///
/// Survives retries and crash/restart cycles: every re-issue of the same
/// logical operation carries the same id, which is what makes exactly-once
/// verification possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a fresh operation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OperationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
