//! Gauntlet Core Library
//!
//! Benchmark orchestration engine for asynchronous, fallible remote
//! operations: a retrying operation executor, an open-loop step-rate load
//! generator, a percentile/statistics engine, a crash/restart
//! fault-recovery harness, a canary/availability prober, and a
//! threshold-based result classifier.

pub mod canary;
pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod load;
pub mod outcome;
pub mod recovery;
pub mod runner;
pub mod stats;
pub mod target;
pub mod types;

// Re-export commonly used types
pub use canary::{CanaryProber, CanaryReport};
pub use classify::{classify, Criterion, Direction, Thresholds};
pub use config::SuiteConfig;
pub use error::{ErrorKind, GauntletError, GauntletResult, HarnessError, TargetError};
pub use executor::{execute, execute_with_receipt, Backoff, RetryPolicy};
pub use load::{LoadGenerator, LoadStepSpec, LoadTestReport};
pub use outcome::{
    BenchStatus, BenchmarkResult, CanaryProbe, LoadStep, MeasurementSeries, OperationOutcome,
    RecoveryCycle,
};
pub use recovery::{CyclePhase, FaultRecoveryHarness, RecoveryReport};
pub use runner::{BenchmarkRunner, SuiteReport};
pub use stats::{iqr, percentile, SeriesSummary};
pub use target::{
    OperationParams, OperationReceipt, ScriptedOutcome, ScriptedTarget, SystemUnderTest,
};
pub use types::{OperationId, TargetRate};
