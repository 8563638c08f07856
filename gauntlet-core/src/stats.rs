// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistics engine for measurement series.
//!
//! Percentiles use the nearest-rank method: sort ascending, take the sample
//! at index `ceil(p/100 * n) - 1`, clamped to `[0, n-1]`. No interpolation,
//! so results are reproducible across implementations. Degenerate input
//! (`n == 0`) yields `None`, never zero.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::outcome::MeasurementSeries;

/// Nearest-rank percentile of a latency sample set.
///
/// `p` is in `0..=100`. Returns `None` for an empty sample set.
pub fn percentile(values: &[Duration], p: u8) -> Option<Duration> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    let rank = (f64::from(p) / 100.0 * n as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(n - 1);

    Some(sorted[index])
}

/// Interquartile range: `percentile(75) - percentile(25)`.
pub fn iqr(values: &[Duration]) -> Option<Duration> {
    let q3 = percentile(values, 75)?;
    let q1 = percentile(values, 25)?;
    Some(q3.saturating_sub(q1))
}

/// Aggregate summary of one frozen measurement series.
///
/// The hand-off format between a completed phase and the result classifier.
/// Latency fields are `None` when the series holds no outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_rate: f64,
    pub error_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iqr: Option<Duration>,
}

impl SeriesSummary {
    /// Summarize a frozen series.
    pub fn from_series(series: &MeasurementSeries) -> Self {
        let latencies = series.latencies();

        let min = latencies.iter().min().copied();
        let max = latencies.iter().max().copied();
        let mean = if latencies.is_empty() {
            None
        } else {
            let sum: Duration = latencies.iter().sum();
            Some(sum / latencies.len() as u32)
        };

        Self {
            total: series.len(),
            successes: series.successes(),
            failures: series.failures(),
            success_rate: series.success_rate(),
            error_rate: series.error_rate(),
            min,
            max,
            mean,
            p50: percentile(&latencies, 50),
            p95: percentile(&latencies, 95),
            iqr: iqr(&latencies),
        }
    }

    /// P95 latency in fractional milliseconds, for classification.
    pub fn p95_millis(&self) -> Option<f64> {
        self.p95.map(|d| d.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&v| Duration::from_millis(v)).collect()
    }

    #[test]
    fn test_percentile_empty_is_none() {
        assert_eq!(percentile(&[], 50), None);
        assert_eq!(iqr(&[]), None);
    }

    #[test]
    fn test_percentile_nearest_rank_n4() {
        // n=4, p=95: index = ceil(0.95 * 4) - 1 = 3
        let values = ms(&[100, 200, 300, 400]);
        assert_eq!(percentile(&values, 95), Some(Duration::from_millis(400)));

        // p=50: index = ceil(2) - 1 = 1
        assert_eq!(percentile(&values, 50), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_percentile_unsorted_input() {
        let values = ms(&[400, 100, 300, 200]);
        assert_eq!(percentile(&values, 95), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_percentile_bounds_and_ordering() {
        let values = ms(&[13, 7, 42, 19, 3, 27, 8]);
        let p50 = percentile(&values, 50).unwrap();
        let p95 = percentile(&values, 95).unwrap();
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();

        assert!(p50 <= p95);
        assert!(p50 >= min && p50 <= max);
        assert!(p95 >= min && p95 <= max);
    }

    #[test]
    fn test_percentile_extremes() {
        let values = ms(&[10, 20, 30]);
        // p=0: rank 0, clamped to index 0
        assert_eq!(percentile(&values, 0), Some(Duration::from_millis(10)));
        // p=100: index = ceil(3) - 1 = 2
        assert_eq!(percentile(&values, 100), Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_percentile_single_sample() {
        let values = ms(&[42]);
        assert_eq!(percentile(&values, 50), Some(Duration::from_millis(42)));
        assert_eq!(percentile(&values, 95), Some(Duration::from_millis(42)));
        assert_eq!(iqr(&values), Some(Duration::ZERO));
    }

    #[test]
    fn test_iqr_from_nearest_rank_quartiles() {
        // n=4: q1 index = ceil(1) - 1 = 0 -> 10, q3 index = ceil(3) - 1 = 2 -> 30
        let values = ms(&[10, 20, 30, 40]);
        assert_eq!(iqr(&values), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_summary_of_empty_series() {
        let summary = SeriesSummary::from_series(&MeasurementSeries::new());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.p50, None);
        assert_eq!(summary.p95, None);
        assert_eq!(summary.iqr, None);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.success_rate, 0.0);
    }

    #[test]
    fn test_summary_aggregates() {
        use crate::outcome::OperationOutcome;
        use chrono::Utc;

        let mut series = MeasurementSeries::new();
        for (success, latency) in [(true, 100u64), (true, 200), (true, 300), (false, 400)] {
            let now = Utc::now();
            series.record(OperationOutcome {
                started_at: now,
                finished_at: now,
                latency: Duration::from_millis(latency),
                success,
                error_kind: None,
                attempts: 1,
            });
        }

        let summary = SeriesSummary::from_series(&series);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.successes, 3);
        assert_eq!(summary.p50, Some(Duration::from_millis(200)));
        assert_eq!(summary.p95, Some(Duration::from_millis(400)));
        assert_eq!(summary.iqr, Some(Duration::from_millis(200)));
        assert_eq!(summary.min, Some(Duration::from_millis(100)));
        assert_eq!(summary.max, Some(Duration::from_millis(400)));
        assert_eq!(summary.mean, Some(Duration::from_millis(250)));
    }
}
