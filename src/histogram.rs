//! Estimated-histogram percentile reconstruction
//!
//! Cassandra summarizes latency/size distributions as fixed bucket-count
//! arrays whose boundaries are not transmitted: each boundary is roughly
//! 1.2x the previous one, rounded and bumped to stay strictly increasing,
//! seeded at 1. Reconstruction regenerates the boundaries for the array
//! length at hand and walks the cumulative counts. A non-zero last bucket
//! means the true maximum exceeded the representable range; nothing is
//! extrapolated past the captured range in that case.

use tracing::warn;

/// Percentiles derived from every reconstructed histogram, in emission
/// order.
pub const PERCENTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.98, 0.99];

/// Reconstructed summary of one estimated histogram. All values are
/// bucket offsets; all are NaN when reconstruction fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSummary {
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn nan() -> Self {
        Self {
            p50: f64::NAN,
            p75: f64::NAN,
            p95: f64::NAN,
            p98: f64::NAN,
            p99: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        }
    }

    /// Percentile values in [`PERCENTILES`] order.
    pub fn percentiles(&self) -> [f64; 5] {
        [self.p50, self.p75, self.p95, self.p98, self.p99]
    }
}

/// Regenerate the bucket upper-bound offsets for a histogram of `n`
/// buckets. Must exactly match the bucketing scheme of the node that
/// produced the counts.
pub fn bucket_offsets(n: usize) -> Vec<i64> {
    let mut offsets = Vec::with_capacity(n);
    let mut last: i64 = 1;
    if n > 0 {
        offsets.push(last);
    }
    for _ in 1..n {
        let mut next = ((last as f64) * 1.2).round() as i64;
        if next == last {
            next += 1;
        }
        offsets.push(next);
        last = next;
    }
    offsets
}

/// Reconstruct percentiles, min and max from raw bucket counts.
///
/// Returns all NaN when the input is empty, all-zero, or overflowed
/// (non-zero last bucket).
pub fn reconstruct(counts: &[i64]) -> HistogramSummary {
    if counts.is_empty() {
        return HistogramSummary::nan();
    }

    let offsets = bucket_offsets(counts.len());

    if *counts.last().expect("non-empty") != 0 {
        warn!(
            largest_bucket = offsets[offsets.len() - 1],
            "estimated histogram overflowed, unable to calculate percentiles"
        );
        return HistogramSummary::nan();
    }

    let total: i64 = counts.iter().sum();
    if total == 0 {
        return HistogramSummary::nan();
    }

    let mut values = [f64::NAN; 5];
    for (slot, &p) in values.iter_mut().zip(PERCENTILES.iter()) {
        let mut cumulative: i64 = 0;
        for (i, &count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative as f64 / total as f64 >= p {
                *slot = offsets[i] as f64;
                break;
            }
        }
    }

    // min/max use strict non-zero lookups, not the cumulative walk.
    let min = counts
        .iter()
        .position(|&c| c > 0)
        .map(|i| offsets[i] as f64)
        .unwrap_or(f64::NAN);
    let max = counts
        .iter()
        .rposition(|&c| c > 0)
        .map(|i| offsets[i] as f64)
        .unwrap_or(f64::NAN);

    HistogramSummary {
        p50: values[0],
        p75: values[1],
        p95: values[2],
        p98: values[3],
        p99: values[4],
        min,
        max,
    }
}
