// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for the Gauntlet engine.
//!
//! These tests drive the public API the way a benchmark binary would:
//! configure a suite, point it at a scripted target, and check the
//! classified results and their evidence.

use std::sync::Arc;
use std::time::Duration;

use gauntlet_core::{
    classify, BenchStatus, BenchmarkRunner, CanaryProber, Direction, ErrorKind, LoadGenerator,
    LoadStepSpec, OperationParams, RetryPolicy, ScriptedOutcome, ScriptedTarget, SuiteConfig,
    SystemUnderTest, TargetRate, Thresholds,
};

type BoxedFuture = std::pin::Pin<
    Box<
        dyn std::future::Future<
                Output = Result<gauntlet_core::OperationReceipt, gauntlet_core::TargetError>,
            > + Send,
    >,
>;

fn op_for(target: Arc<ScriptedTarget>) -> impl Fn() -> BoxedFuture + Clone + Send + Sync + 'static {
    move || {
        let target = target.clone();
        Box::pin(async move {
            target
                .execute_operation(OperationParams::new(serde_json::Value::Null))
                .await
        }) as BoxedFuture
    }
}

/// Prober over a 15-minute window at a 5-minute interval, with the 2nd of
/// 3 probes failing: 2/3 success ratio, exactly one alert, MTBF = window.
#[tokio::test(start_paused = true)]
async fn test_canary_scenario_from_probe_schedule() {
    let target = Arc::new(ScriptedTarget::new([
        ScriptedOutcome::Succeed {
            latency: Duration::from_millis(5),
        },
        ScriptedOutcome::Fail {
            kind: ErrorKind::Connection,
            latency: Duration::from_millis(5),
        },
        ScriptedOutcome::Succeed {
            latency: Duration::from_millis(5),
        },
    ]));

    let prober = CanaryProber::new(
        Duration::from_secs(5 * 60),
        Duration::from_secs(15 * 60),
        Duration::from_secs(10),
    );

    let mut alerts = 0u32;
    let report = prober.run(op_for(target), |_| alerts += 1).await;

    assert_eq!(report.probes.len(), 3);
    assert!((report.success_ratio() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(alerts, 1);
    assert_eq!(report.alerts, 1);
    assert_eq!(report.mtbf(), Duration::from_secs(15 * 60));
}

/// Steps run strictly sequentially: start timestamps are monotonically
/// non-decreasing and separated by at least the configured duration.
/// Wall-clock timing, so this test runs in real time.
#[tokio::test]
async fn test_load_steps_spaced_by_duration() {
    let target = Arc::new(ScriptedTarget::always_healthy(Duration::from_millis(1)));
    let generator = LoadGenerator::new(RetryPolicy::no_retry(Duration::from_millis(500)));

    let step_duration = Duration::from_millis(300);
    let steps = [
        LoadStepSpec {
            rate: TargetRate::new(10.0).unwrap(),
            duration: step_duration,
        },
        LoadStepSpec {
            rate: TargetRate::new(10.0).unwrap(),
            duration: step_duration,
        },
    ];

    let report = generator.run(&steps, op_for(target)).await;

    assert_eq!(report.steps.len(), 2);
    let gap = report.steps[1]
        .started_at
        .signed_duration_since(report.steps[0].started_at)
        .to_std()
        .expect("step order must be monotonic");
    assert!(
        gap >= step_duration - Duration::from_millis(20),
        "steps overlapped: gap {:?}",
        gap
    );
}

/// A target that rate-limits everything beyond a low rate produces a knee
/// at the first saturated step and a sustainable rate at the last healthy one.
#[tokio::test(start_paused = true)]
async fn test_knee_detection_under_rate_limiting() {
    // Enough successes for the 1 ops/sec step, then hard rate limiting.
    let mut script = vec![
        ScriptedOutcome::Succeed {
            latency: Duration::from_millis(10),
        };
        3
    ];
    for _ in 0..200 {
        script.push(ScriptedOutcome::Fail {
            kind: ErrorKind::RateLimited,
            latency: Duration::from_millis(5),
        });
    }
    let target = Arc::new(ScriptedTarget::new(script));
    let generator = LoadGenerator::new(RetryPolicy::no_retry(Duration::from_millis(500)));

    let steps = [
        LoadStepSpec {
            rate: TargetRate::new(1.0).unwrap(),
            duration: Duration::from_secs(2),
        },
        LoadStepSpec {
            rate: TargetRate::new(20.0).unwrap(),
            duration: Duration::from_secs(2),
        },
    ];
    let report = generator.run(&steps, op_for(target)).await;

    assert_eq!(report.error_knee().unwrap().ops_per_sec(), 20.0);
    assert_eq!(report.sustainable_rate().unwrap().ops_per_sec(), 1.0);
}

/// Classifier bands for a lower-is-better latency criterion.
#[test]
fn test_classifier_latency_bands() {
    let thresholds = Thresholds {
        passed: 100.0,
        partial: 200.0,
    };

    assert_eq!(
        classify(50.0, &thresholds, Direction::LowerIsBetter),
        BenchStatus::Passed
    );
    assert_eq!(
        classify(150.0, &thresholds, Direction::LowerIsBetter),
        BenchStatus::Partial
    );
    assert_eq!(
        classify(250.0, &thresholds, Direction::LowerIsBetter),
        BenchStatus::Failed
    );
}

/// A full suite run against a degraded target completes and classifies
/// every configured criterion; nothing panics, nothing is skipped.
#[tokio::test(start_paused = true)]
async fn test_full_suite_against_flaky_target() {
    // Roughly every third operation fails with a transient error.
    let mut script = Vec::new();
    for i in 0..120 {
        if i % 3 == 0 {
            script.push(ScriptedOutcome::Fail {
                kind: ErrorKind::RateLimited,
                latency: Duration::from_millis(5),
            });
        } else {
            script.push(ScriptedOutcome::Succeed {
                latency: Duration::from_millis(10),
            });
        }
    }
    let target = Arc::new(ScriptedTarget::new(script));

    let config = SuiteConfig::load_string(
        r#"
suite: flaky-target

retry:
  max_attempts: 2
  per_attempt_timeout_ms: 1000
  backoff_base_ms: 10
  backoff_cap_ms: 50

load_steps:
  - rate: 5.0
    duration_secs: 2

recovery:
  cycles_per_phase: 2
  settle_delay_ms: 100
  resolve_timeout_ms: 500

canary:
  interval_secs: 2
  window_secs: 6
  probe_timeout_ms: 1000

criteria:
  - name: sustainable_throughput
    unit: ops/s
    direction: higher_is_better
    passed: 4.0
    partial: 1.0
  - name: p95_latency
    unit: ms
    direction: lower_is_better
    passed: 500.0
    partial: 2000.0
  - name: recovery_mttr
    unit: ms
    direction: lower_is_better
    passed: 500.0
    partial: 2000.0
  - name: availability
    unit: ratio
    direction: higher_is_better
    passed: 0.99
    partial: 0.5
"#,
    )
    .unwrap();

    let runner = BenchmarkRunner::new(config);
    let report = runner.run_suite(target).await;

    assert_eq!(report.results.len(), 4);
    for result in &report.results {
        // Every criterion produced a terminal record with evidence.
        assert!(!result.evidence.is_null(), "{} lacks evidence", result.criterion);
    }

    // The whole report serializes for downstream formatting.
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("flaky-target"));
    assert!(json.contains("sustainable_throughput"));
}

/// A cycle whose restart budget is exhausted degrades that cycle only;
/// later cycles still run and the suite still classifies.
#[tokio::test(start_paused = true)]
async fn test_recovery_harness_fault_contained() {
    let target = Arc::new(ScriptedTarget::new([]));
    target.fail_next_connects(3);

    let config = SuiteConfig::load_string(
        r#"
suite: contained-fault
load_steps:
  - rate: 1.0
    duration_secs: 1
recovery:
  cycles_per_phase: 2
  settle_delay_ms: 50
  restart_attempts: 3
  resolve_timeout_ms: 500
criteria:
  - name: recovery_mttr
    unit: ms
    direction: lower_is_better
    passed: 500.0
    partial: 2000.0
"#,
    )
    .unwrap();

    let runner = BenchmarkRunner::new(config);
    let (result, report) = runner.run_recovery(target).await;

    assert_eq!(report.idle_cycles.len(), 2);
    assert_eq!(report.mid_operation_cycles.len(), 2);
    assert!(!report.idle_cycles[0].healthy);
    assert!(report.idle_cycles[1].healthy);
    assert!(!report.exactly_once_completion());

    // The run still produced a classified result.
    assert!(result.is_some());
}
