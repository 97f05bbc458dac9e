use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::models::{MaterialRecord, SeriesBucket, SummaryStats, TimeRange};

pub fn cutoff_instant(range: TimeRange, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    range.cutoff_days().map(|days| now - Duration::days(days))
}

/// Records at or after the range cutoff, input order preserved.
/// The cutoff compares absolute instants, not calendar days.
pub fn filter_by_range(
    records: &[MaterialRecord],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<MaterialRecord> {
    match cutoff_instant(range, now) {
        Some(cutoff) => records
            .iter()
            .filter(|record| record.created_at >= cutoff)
            .cloned()
            .collect(),
        None => records.to_vec(),
    }
}

pub fn summarize(records: &[MaterialRecord]) -> SummaryStats {
    let mut stats = SummaryStats::default();
    for record in records {
        stats.materials += 1;
        stats.diamonds += record.diamonds;
        stats.earnings += record.earnings;
        stats.views += record.views;
        stats.downloads += record.downloads;
    }
    stats
}

/// Diamonds and earnings per local calendar day, one bucket per day for
/// the range's window ending today. A record counts toward a bucket when
/// its creation instant, seen in local time, falls on that exact day;
/// this same-day predicate intentionally differs from the instant-based
/// range cutoff above.
pub fn daily_series(
    records: &[MaterialRecord],
    range: TimeRange,
    today: NaiveDate,
) -> Vec<SeriesBucket> {
    let count = range.bucket_count();
    let mut series = Vec::with_capacity(count);

    for offset in (0..count).rev() {
        let day = today - Duration::days(offset as i64);
        let mut bucket = SeriesBucket {
            day,
            label: day.format("%b %-d").to_string(),
            diamonds: 0,
            earnings: 0.0,
        };
        for record in records {
            if record.created_at.with_timezone(&Local).date_naive() == day {
                bucket.diamonds += record.diamonds;
                bucket.earnings += record.earnings;
            }
        }
        series.push(bucket);
    }

    series
}
