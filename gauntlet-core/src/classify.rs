// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result classifier.
//!
//! Pure threshold comparison, parameterized with a direction flag so that
//! lower-is-better metrics (latency, MTTR, error rate) and higher-is-better
//! metrics (throughput, availability) share one code path instead of
//! duplicated per-metric logic. Ties at a threshold boundary count as
//! meeting that threshold.

use serde::{Deserialize, Serialize};

use crate::error::ConfigValidationError;
use crate::outcome::{BenchStatus, BenchmarkResult};

/// Which way a criterion's value improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HigherIsBetter => "higher_is_better",
            Self::LowerIsBetter => "lower_is_better",
        }
    }
}

/// Ordered pair of thresholds: `passed` is stricter than `partial`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub passed: f64,
    pub partial: f64,
}

impl Thresholds {
    /// Check that the ordering is consistent with the direction.
    pub fn validate(
        &self,
        direction: Direction,
        criterion: &str,
    ) -> Result<(), ConfigValidationError> {
        let consistent = match direction {
            Direction::HigherIsBetter => self.passed >= self.partial,
            Direction::LowerIsBetter => self.passed <= self.partial,
        };

        if !consistent {
            return Err(ConfigValidationError::ThresholdOrdering {
                criterion: criterion.to_string(),
                passed: self.passed,
                partial: self.partial,
                direction: direction.name(),
            });
        }
        Ok(())
    }
}

/// Classify a metric value against its thresholds. Boundary ties are
/// inclusive.
pub fn classify(value: f64, thresholds: &Thresholds, direction: Direction) -> BenchStatus {
    let meets = |threshold: f64| match direction {
        Direction::HigherIsBetter => value >= threshold,
        Direction::LowerIsBetter => value <= threshold,
    };

    if meets(thresholds.passed) {
        BenchStatus::Passed
    } else if meets(thresholds.partial) {
        BenchStatus::Partial
    } else {
        BenchStatus::Failed
    }
}

/// One benchmark criterion: name, unit, direction, and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub unit: String,
    pub direction: Direction,
    pub thresholds: Thresholds,
}

impl Criterion {
    /// Create a criterion, validating threshold ordering.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        direction: Direction,
        thresholds: Thresholds,
    ) -> Result<Self, ConfigValidationError> {
        let name = name.into();
        thresholds.validate(direction, &name)?;
        Ok(Self {
            name,
            unit: unit.into(),
            direction,
            thresholds,
        })
    }

    pub fn classify(&self, value: f64) -> BenchStatus {
        classify(value, &self.thresholds, self.direction)
    }

    /// Assemble the terminal result record. A missing value means the run
    /// produced no data for this criterion; that is a failure, never a
    /// silent pass.
    pub fn result(&self, value: Option<f64>, evidence: serde_json::Value) -> BenchmarkResult {
        let status = match value {
            Some(v) => self.classify(v),
            None => BenchStatus::Failed,
        };

        tracing::info!(
            criterion = %self.name,
            value = ?value,
            status = %status,
            "Criterion classified"
        );

        BenchmarkResult {
            criterion: self.name.clone(),
            unit: self.unit.clone(),
            value,
            status,
            evidence,
        }
    }
}
