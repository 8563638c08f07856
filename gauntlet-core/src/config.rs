// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML suite configuration with strict schema validation.
//!
//! Parsed in two stages: raw serde structs, then fail-fast validation into
//! strongly-typed config. Any invalid field prevents the run from starting.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::canary::CanaryProber;
use crate::classify::{Criterion, Direction, Thresholds};
use crate::error::{ConfigValidationError, GauntletError, GauntletResult};
use crate::executor::{Backoff, RetryPolicy};
use crate::load::LoadStepSpec;
use crate::recovery::FaultRecoveryHarness;
use crate::types::TargetRate;

/// Raw retry policy as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawRetryConfig {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_per_attempt_timeout_ms")]
    per_attempt_timeout_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    backoff_cap_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_per_attempt_timeout_ms() -> u64 {
    30_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    15_000 // Matches the executor's default backoff ceiling
}

impl Default for RawRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            per_attempt_timeout_ms: default_per_attempt_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

/// Raw load step.
#[derive(Debug, Deserialize)]
struct RawLoadStep {
    rate: f64,
    duration_secs: u64,
}

/// Raw recovery harness parameters.
#[derive(Debug, Deserialize)]
struct RawRecoveryConfig {
    #[serde(default = "default_cycles_per_phase")]
    cycles_per_phase: u32,
    #[serde(default = "default_settle_delay_ms")]
    settle_delay_ms: u64,
    #[serde(default = "default_restart_attempts")]
    restart_attempts: u32,
    #[serde(default = "default_verify_attempts")]
    verify_attempts: u32,
    #[serde(default = "default_resolve_timeout_ms")]
    resolve_timeout_ms: u64,
}

fn default_cycles_per_phase() -> u32 {
    3
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_restart_attempts() -> u32 {
    3
}

fn default_verify_attempts() -> u32 {
    3
}

fn default_resolve_timeout_ms() -> u64 {
    5_000
}

impl Default for RawRecoveryConfig {
    fn default() -> Self {
        Self {
            cycles_per_phase: default_cycles_per_phase(),
            settle_delay_ms: default_settle_delay_ms(),
            restart_attempts: default_restart_attempts(),
            verify_attempts: default_verify_attempts(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
        }
    }
}

/// Raw canary parameters.
#[derive(Debug, Deserialize)]
struct RawCanaryConfig {
    #[serde(default = "default_canary_interval_secs")]
    interval_secs: u64,
    #[serde(default = "default_canary_window_secs")]
    window_secs: u64,
    #[serde(default = "default_probe_timeout_ms")]
    probe_timeout_ms: u64,
}

fn default_canary_interval_secs() -> u64 {
    300
}

fn default_canary_window_secs() -> u64 {
    900
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

impl Default for RawCanaryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_canary_interval_secs(),
            window_secs: default_canary_window_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Raw criterion definition.
#[derive(Debug, Deserialize)]
struct RawCriterion {
    name: String,
    unit: String,
    direction: Direction,
    passed: f64,
    partial: f64,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    suite: String,
    #[serde(default)]
    deadline_secs: Option<u64>,
    #[serde(default)]
    retry: RawRetryConfig,
    load_steps: Vec<RawLoadStep>,
    #[serde(default)]
    recovery: RawRecoveryConfig,
    #[serde(default)]
    canary: RawCanaryConfig,
    criteria: Vec<RawCriterion>,
}

/// Complete validated suite configuration.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub suite: String,
    /// Overall run deadline; once expired no new operations are dispatched.
    pub deadline: Option<Duration>,
    pub retry: RetryPolicy,
    pub load_steps: Vec<LoadStepSpec>,
    pub recovery: FaultRecoveryHarness,
    pub canary: CanaryProber,
    pub criteria: Vec<Criterion>,
}

impl SuiteConfig {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> GauntletResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(GauntletError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| GauntletError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> GauntletResult<Self> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| GauntletError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    /// Find a criterion by name.
    pub fn criterion(&self, name: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.name == name)
    }

    fn validate(raw: RawConfig) -> GauntletResult<Self> {
        if raw.suite.is_empty() {
            return Err(ConfigValidationError::MissingRequiredField {
                field: "suite",
                context: "root".to_string(),
            }
            .into());
        }

        if let Some(0) = raw.deadline_secs {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "deadline_secs",
                value: "0".to_string(),
                reason: "Deadline must be positive when set".to_string(),
            }
            .into());
        }

        let retry = Self::validate_retry(raw.retry)?;
        let load_steps = Self::validate_steps(raw.load_steps)?;
        let recovery = Self::validate_recovery(raw.recovery, retry.clone())?;
        let canary = Self::validate_canary(raw.canary)?;
        let criteria = Self::validate_criteria(raw.criteria)?;

        Ok(Self {
            suite: raw.suite,
            deadline: raw.deadline_secs.map(Duration::from_secs),
            retry,
            load_steps,
            recovery,
            canary,
            criteria,
        })
    }

    fn validate_retry(raw: RawRetryConfig) -> GauntletResult<RetryPolicy> {
        if raw.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "retry.max_attempts",
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            }
            .into());
        }

        Ok(RetryPolicy {
            max_attempts: raw.max_attempts,
            per_attempt_timeout: Duration::from_millis(raw.per_attempt_timeout_ms),
            backoff: Backoff::Exponential {
                base: Duration::from_millis(raw.backoff_base_ms),
                cap: Duration::from_millis(raw.backoff_cap_ms),
            },
            retryable: |kind| kind.is_transient(),
        })
    }

    fn validate_steps(raw: Vec<RawLoadStep>) -> GauntletResult<Vec<LoadStepSpec>> {
        if raw.is_empty() {
            return Err(ConfigValidationError::EmptyStepGrid.into());
        }

        let mut steps = Vec::with_capacity(raw.len());
        for step in raw {
            if step.duration_secs == 0 {
                return Err(ConfigValidationError::InvalidFieldValue {
                    field: "load_steps.duration_secs",
                    value: "0".to_string(),
                    reason: "Step duration must be positive".to_string(),
                }
                .into());
            }
            steps.push(LoadStepSpec {
                rate: TargetRate::new(step.rate).map_err(GauntletError::ConfigValidation)?,
                duration: Duration::from_secs(step.duration_secs),
            });
        }
        Ok(steps)
    }

    fn validate_recovery(
        raw: RawRecoveryConfig,
        policy: RetryPolicy,
    ) -> GauntletResult<FaultRecoveryHarness> {
        if raw.cycles_per_phase == 0 {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "recovery.cycles_per_phase",
                value: "0".to_string(),
                reason: "At least one cycle per phase is required".to_string(),
            }
            .into());
        }

        Ok(FaultRecoveryHarness {
            cycles_per_phase: raw.cycles_per_phase,
            settle_delay: Duration::from_millis(raw.settle_delay_ms),
            restart_attempts: raw.restart_attempts.max(1),
            verify_attempts: raw.verify_attempts.max(1),
            resolve_timeout: Duration::from_millis(raw.resolve_timeout_ms),
            in_flight_delay: Duration::from_millis(100),
            policy,
        })
    }

    fn validate_canary(raw: RawCanaryConfig) -> GauntletResult<CanaryProber> {
        if raw.interval_secs == 0 {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "canary.interval_secs",
                value: "0".to_string(),
                reason: "Probe interval must be positive".to_string(),
            }
            .into());
        }

        if raw.window_secs < raw.interval_secs {
            return Err(ConfigValidationError::InvalidFieldValue {
                field: "canary.window_secs",
                value: raw.window_secs.to_string(),
                reason: "Window must cover at least one probe interval".to_string(),
            }
            .into());
        }

        Ok(CanaryProber::new(
            Duration::from_secs(raw.interval_secs),
            Duration::from_secs(raw.window_secs),
            Duration::from_millis(raw.probe_timeout_ms),
        ))
    }

    fn validate_criteria(raw: Vec<RawCriterion>) -> GauntletResult<Vec<Criterion>> {
        let mut criteria: Vec<Criterion> = Vec::with_capacity(raw.len());
        for c in raw {
            if criteria.iter().any(|existing| existing.name == c.name) {
                return Err(ConfigValidationError::DuplicateCriterion { name: c.name }.into());
            }
            criteria.push(
                Criterion::new(
                    c.name,
                    c.unit,
                    c.direction,
                    Thresholds {
                        passed: c.passed,
                        partial: c.partial,
                    },
                )
                .map_err(GauntletError::ConfigValidation)?,
            );
        }
        Ok(criteria)
    }
}
