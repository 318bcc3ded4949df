//! Cache Key Module
//!
//! Builds cache keys that stay stable inside a time bucket and change when a
//! bucket boundary is crossed.

use chrono::{DateTime, Utc};

const MILLIS_PER_MINUTE: i64 = 60_000;

// == Time Bucket ==
/// Appends the index of the current `interval_minutes` bucket to `base`.
///
/// Buckets are counted from the Unix epoch with plain integer division, so
/// they carry no alignment beyond that. An interval of zero is treated as one
/// minute.
pub fn time_bucket_key(base: &str, interval_minutes: u32) -> String {
    time_bucket_key_at(base, interval_minutes, Utc::now())
}

pub fn time_bucket_key_at(base: &str, interval_minutes: u32, now: DateTime<Utc>) -> String {
    let width = i64::from(interval_minutes.max(1)) * MILLIS_PER_MINUTE;
    let bucket = now.timestamp_millis().div_euclid(width);
    format!("{base}_{bucket}")
}

// == Date Bucket ==
/// Appends the current UTC calendar date (`YYYY-MM-DD`) to `base`.
pub fn date_bucket_key(base: &str) -> String {
    date_bucket_key_at(base, Utc::now())
}

pub fn date_bucket_key_at(base: &str, now: DateTime<Utc>) -> String {
    format!("{base}_{}", now.format("%Y-%m-%d"))
}

// == Canonical List ==
/// Joins a multi-valued parameter in sorted order, or returns `"all"` when
/// the parameter is absent.
///
/// Keys built from the result do not depend on the order the caller listed
/// the values in.
pub fn canonical_list<T: ToString>(values: Option<&[T]>) -> String {
    match values {
        None => "all".to_string(),
        Some(values) => {
            let mut parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            parts.sort();
            parts.join(",")
        }
    }
}
