//! Reduction of raw trial results into percentile summaries.

use std::collections::BTreeMap;

use crate::bench::{ BenchmarkKey, BenchmarkResult };
use crate::constants::PERCENTILES;
use crate::error::{ BenchError, Result };

/// Percentile summary of every trial recorded for one key
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSummary {
    pub key: BenchmarkKey,
    pub iteration_num: usize,
    pub total_msg_num: usize,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Collects results per key, ordered by key.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    groups: BTreeMap<BenchmarkKey, Vec<BenchmarkResult>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: BenchmarkResult) {
        self.groups.entry(result.key.clone()).or_default().push(result);
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// One summary per key. Fails on the first key whose results disagree
    /// on the total message count.
    pub fn summarize(&self) -> Result<Vec<BenchmarkSummary>> {
        self.groups
            .iter()
            .filter(|(_, results)| !results.is_empty())
            .map(|(key, results)| summarize_group(key, results))
            .collect()
    }
}

fn summarize_group(key: &BenchmarkKey, results: &[BenchmarkResult]) -> Result<BenchmarkSummary> {
    let total_msg_num = results[0].total_msg_num;
    if let Some(odd) = results.iter().find(|r| r.total_msg_num != total_msg_num) {
        return Err(
            BenchError::invariant(
                key,
                format!("trials disagree on message count: {} vs {}", total_msg_num, odd.total_msg_num)
            )
        );
    }

    let mut metrics: Vec<f64> = results
        .iter()
        .map(|r| r.metric)
        .collect();
    metrics.sort_by(f64::total_cmp);

    let [p50, p75, p90, p99] = PERCENTILES.map(|pct| percentile(&metrics, pct));
    Ok(BenchmarkSummary {
        key: key.clone(),
        iteration_num: metrics.len(),
        total_msg_num,
        min: metrics[0],
        max: metrics[metrics.len() - 1],
        p50,
        p75,
        p90,
        p99,
    })
}

/// Rank-indexed percentile of an ascending, non-empty slice: `sorted[floor(pct * n / 100)]`.
pub fn percentile(sorted: &[f64], pct: usize) -> f64 {
    let idx = (sorted.len() * pct) / 100;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, metric: f64, total: usize) -> BenchmarkResult {
        BenchmarkResult {
            key: BenchmarkKey::new(name, "batched_spsc", 1024, "u32", 1, 1),
            metric,
            total_msg_num: total,
        }
    }

    #[test]
    fn test_percentile_rank_indexing() {
        let sorted: Vec<f64> = (0..100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 50), 50.0);
        assert_eq!(percentile(&sorted, 99), 99.0);
        assert_eq!(percentile(&[3.0], 99), 3.0);
    }

    #[test]
    fn test_summary_is_ordered() {
        let mut stats = StatsAggregator::new();
        for i in (0..100).rev() {
            stats.record(result("a", f64::from(i) * 1.5, 1000));
        }

        let summaries = stats.summarize().unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.iteration_num, 100);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.p50, 75.0);
        assert_eq!(s.max, 148.5);
        assert!(s.min <= s.p50 && s.p50 <= s.p75 && s.p75 <= s.p90 && s.p90 <= s.p99 && s.p99 <= s.max);
    }

    #[test]
    fn test_mismatched_totals_abort() {
        let mut stats = StatsAggregator::new();
        stats.record(result("a", 1.0, 1000));
        stats.record(result("a", 2.0, 999));
        stats.record(result("b", 2.0, 1000));

        let err = stats.summarize().unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn test_groups_are_sorted_by_key() {
        let mut stats = StatsAggregator::new();
        stats.record(result("b", 1.0, 10));
        stats.record(result("a", 1.0, 20));
        let names: Vec<_> = stats
            .summarize()
            .unwrap()
            .into_iter()
            .map(|s| s.key.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(stats.len(), 2);
    }
}
