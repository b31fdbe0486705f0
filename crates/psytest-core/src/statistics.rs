//! Goodness-of-fit and history statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::results::TestResult;

/// Pearson's chi-square statistic of `observed` against a uniform
/// expectation.
///
/// Returns 0.0 for an empty slice or when every count is zero.
pub fn chi_square(observed: &[u64]) -> f64 {
    let total: u64 = observed.iter().sum();
    if observed.is_empty() || total == 0 {
        return 0.0;
    }
    let expected = total as f64 / observed.len() as f64;
    observed
        .iter()
        .map(|&o| {
            let diff = o as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

/// Summary of a user's attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub attempts: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub latest_score: f64,
    /// Mean percentage per block id, over attempts that included the block.
    pub per_block: BTreeMap<String, BlockStats>,
}

/// Aggregate of one block across attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStats {
    pub name: String,
    pub attempts: usize,
    pub mean_percentage: f64,
}

/// Compute history statistics over `results`, which must be oldest first.
///
/// Returns `None` when there are no results. Empty blocks are left out of
/// the per-block means.
pub fn history_stats(results: &[TestResult]) -> Option<HistoryStats> {
    let latest = results.last()?;
    let attempts = results.len();

    let best_score = results
        .iter()
        .map(|r| r.aggregate_score)
        .fold(f64::MIN, f64::max);
    let mean_score = results.iter().map(|r| r.aggregate_score).sum::<f64>() / attempts as f64;

    let mut sums: BTreeMap<String, (String, usize, f64)> = BTreeMap::new();
    for block in results.iter().flat_map(|r| &r.blocks) {
        if block.empty {
            continue;
        }
        let entry = sums
            .entry(block.block_id.clone())
            .or_insert_with(|| (block.name.clone(), 0, 0.0));
        entry.1 += 1;
        entry.2 += block.percentage;
    }

    let per_block = sums
        .into_iter()
        .map(|(id, (name, n, sum))| {
            (
                id,
                BlockStats {
                    name,
                    attempts: n,
                    mean_percentage: sum / n as f64,
                },
            )
        })
        .collect();

    Some(HistoryStats {
        attempts,
        best_score,
        mean_score,
        latest_score: latest.aggregate_score,
        per_block,
    })
}
