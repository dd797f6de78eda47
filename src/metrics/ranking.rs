//! Top-N selection over per-process samples.

use crate::metrics::data::{RankMetric, RankedProcess, RankedProcessList};

/// Number of entries kept in every ranking, and the most any ranking may hold.
pub const DEFAULT_TOP_N: usize = 5;

/// Sort `samples` descending by value and keep the first `limit`, never more than
/// [`DEFAULT_TOP_N`].
///
/// The sort is stable, so equal values keep their enumeration order. Non-finite
/// values rank as 0.
pub fn rank_top(
    metric: RankMetric,
    samples: impl IntoIterator<Item = RankedProcess>,
    limit: usize,
) -> RankedProcessList {
    let mut entries: Vec<RankedProcess> = samples
        .into_iter()
        .map(|mut sample| {
            if !sample.value.is_finite() {
                sample.value = 0.0;
            }
            sample
        })
        .collect();

    entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    entries.truncate(limit.min(DEFAULT_TOP_N));

    RankedProcessList::from_ranked(metric, entries)
}
