//! Volume/Trend Aggregation
//!
//! Builds the topic × day intensity matrix and its day-over-day trends.
//!
//! A message counts toward a topic when the lower-cased label occurs anywhere
//! in the lower-cased message text. The same predicate selects a cell's
//! drill-down messages, so what a user reads is exactly what was counted.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::types::{AnalysisMatrix, DayBucket, Message, Topic};

/// Messages of `bucket` that mention `topic`, in bucket order
pub fn relevant_messages<'t, 'b>(
    topic: &'t Topic,
    bucket: &'b DayBucket,
) -> impl Iterator<Item = &'b Message> + use<'t, 'b> {
    bucket.messages.iter().filter(move |m| topic.matches(&m.text))
}

/// `round(100 * matches / total)` with ties rounded up, in integer arithmetic.
///
/// Returns 0 when `total` is 0. `matches` must not exceed `total`.
pub fn round_half_up_percent(matches: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    debug_assert!(matches <= total);
    let (m, n) = (matches.min(total) as u64, total as u64);
    ((200 * m + n) / (2 * n)) as u8
}

pub struct VolumeAggregator;

impl VolumeAggregator {
    /// Compute the matrix for `topics` over `days`.
    ///
    /// Days without a bucket (or with an empty one) score 0 for every topic.
    /// Buckets for dates outside `days` are ignored. `days` is sorted and
    /// deduplicated first.
    pub fn aggregate(topics: Vec<Topic>, days: &[NaiveDate], buckets: &[DayBucket]) -> AnalysisMatrix {
        let mut days = days.to_vec();
        days.sort_unstable();
        days.dedup();

        let by_date: HashMap<NaiveDate, &DayBucket> = buckets.iter().map(|b| (b.date, b)).collect();
        let empty: Vec<DayBucket> = days.iter().map(|d| DayBucket::new(*d)).collect();
        let columns: Vec<&DayBucket> = days
            .iter()
            .zip(&empty)
            .map(|(d, fallback)| by_date.get(d).copied().unwrap_or(fallback))
            .collect();

        let mut values = Vec::with_capacity(topics.len());
        let mut trends = Vec::with_capacity(topics.len());

        for topic in &topics {
            let row: Vec<u8> = columns
                .iter()
                .map(|bucket| {
                    let matched = relevant_messages(topic, bucket).count();
                    round_half_up_percent(matched, bucket.len())
                })
                .collect();
            trends.push(trend_row(&row));
            values.push(row);
        }

        debug!(
            topics = topics.len(),
            days = days.len(),
            "Aggregated intensity matrix"
        );

        AnalysisMatrix {
            topics,
            days,
            values,
            trends,
        }
    }
}

/// `0` for the first day, then the signed day-over-day difference
fn trend_row(row: &[u8]) -> Vec<i16> {
    let mut trend = Vec::with_capacity(row.len());
    for (d, value) in row.iter().enumerate() {
        trend.push(if d == 0 {
            0
        } else {
            *value as i16 - row[d - 1] as i16
        });
    }
    trend
}
