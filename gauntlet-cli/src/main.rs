// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Gauntlet CLI
//!
//! Command-line runner for the Gauntlet benchmark orchestration engine.
//! Drives a configured suite against the built-in scripted target; real
//! deployments link `gauntlet-core` and supply their own `SystemUnderTest`
//! adapter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gauntlet_core::{
    BenchStatus, BenchmarkRunner, ErrorKind, ScriptedOutcome, ScriptedTarget, SuiteConfig,
};

mod reporter;

use reporter::{BenchReport, JsonReporter};

/// Gauntlet - empirical benchmark orchestration engine
#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a benchmark suite against the built-in scripted target
    Run {
        /// Suite configuration file path
        #[arg(short, long, default_value = "gauntlet.yaml")]
        config: String,

        /// Output directory for JSON reports
        #[arg(short, long, default_value = "data")]
        output: PathBuf,

        /// Quick mode: shrink durations and cycle counts for a smoke run
        #[arg(long)]
        quick: bool,
    },

    /// Validate a suite configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Run {
            config,
            output,
            quick,
        } => run(&config, &output, quick).await,
        Commands::Validate { file } => validate(&file),
    }
}

async fn run(config_path: &str, output: &PathBuf, quick: bool) -> anyhow::Result<()> {
    let mut config = SuiteConfig::load_file(config_path)?;
    if quick {
        apply_quick_mode(&mut config);
    }

    println!("Gauntlet Benchmark Suite");
    println!("========================");
    println!("Suite: {}", config.suite);
    println!("Load steps: {}", config.load_steps.len());
    println!("Criteria: {}", config.criteria.len());
    println!();

    let target = Arc::new(demo_target());
    let runner = BenchmarkRunner::new(config);
    tracing::info!(suite = %runner.config().suite, quick, "Starting suite run");
    let suite_report = runner.run_suite(target).await;

    let report = BenchReport::from_suite(suite_report);
    let reporter = JsonReporter::new(output)?;
    let path = reporter.save(&report)?;

    println!();
    println!("Report saved to: {:?}", path);
    println!();
    print_summary(&report);

    if report
        .results
        .iter()
        .any(|r| r.status == BenchStatus::Failed)
    {
        std::process::exit(1);
    }

    Ok(())
}

fn validate(path: &str) -> anyhow::Result<()> {
    let config = SuiteConfig::load_file(path)?;
    println!(
        "Configuration OK: suite '{}', {} load steps, {} criteria",
        config.suite,
        config.load_steps.len(),
        config.criteria.len()
    );
    Ok(())
}

/// Shrink the suite so a full pass finishes in seconds.
fn apply_quick_mode(config: &mut SuiteConfig) {
    for step in &mut config.load_steps {
        step.duration = step.duration.min(Duration::from_secs(2));
    }
    config.recovery.cycles_per_phase = 1;
    config.recovery.settle_delay = config.recovery.settle_delay.min(Duration::from_millis(200));
    config.canary.interval = config.canary.interval.min(Duration::from_secs(1));
    config.canary.window = config.canary.window.min(Duration::from_secs(3));
}

/// Deterministic demo target: mostly healthy, with periodic rate limiting
/// and one slow operation to exercise the retry path.
fn demo_target() -> ScriptedTarget {
    let mut script = Vec::new();
    for i in 0..400 {
        if i % 11 == 0 {
            script.push(ScriptedOutcome::Fail {
                kind: ErrorKind::RateLimited,
                latency: Duration::from_millis(5),
            });
        } else if i % 53 == 0 {
            script.push(ScriptedOutcome::Hang {
                resume_after: Duration::from_millis(400),
            });
        } else {
            script.push(ScriptedOutcome::Succeed {
                latency: Duration::from_millis(8),
            });
        }
    }
    ScriptedTarget::new(script)
}

fn print_summary(report: &BenchReport) {
    println!("Summary");
    println!("-------");
    println!();

    for result in &report.results {
        let value = result
            .value
            .map(|v| format!("{:.2} {}", v, result.unit))
            .unwrap_or_else(|| "no data".to_string());
        println!("{}: {} [{}]", result.criterion, value, result.status);
    }
}
