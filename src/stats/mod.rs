//! Click-statistics aggregation: time-bucketed series with no silent gaps,
//! and a per-language breakdown. Every bucket boundary is computed in UTC;
//! all ranges below derive from the same UTC day start.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{ClickBucket, Storage};

const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
}

/// One point of a click series: UTC bucket start and count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatPoint {
    pub bucket: i64,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageCount {
    pub lang: String,
    pub clicks: i64,
}

/// Start of the UTC calendar day containing `now`, as unix seconds.
fn utc_day_start(now: DateTime<Utc>) -> i64 {
    (now.timestamp().div_euclid(DAY_SECS)) * DAY_SECS
}

/// Hourly series for the current UTC day. Buckets without events are
/// omitted; an entirely empty day becomes a two-point flat zero-line
/// spanning the day's start and end instants so charts keep a baseline.
pub fn hour_series(day_start: i64, raw: Vec<ClickBucket>) -> Vec<StatPoint> {
    if raw.is_empty() {
        return vec![
            StatPoint { bucket: day_start, clicks: 0 },
            StatPoint { bucket: day_start + DAY_SECS, clicks: 0 },
        ];
    }
    raw.into_iter()
        .map(|(bucket, clicks)| StatPoint { bucket, clicks })
        .collect()
}

/// Daily series over all history; only days with at least one event.
pub fn day_series(raw: Vec<ClickBucket>) -> Vec<StatPoint> {
    raw.into_iter()
        .map(|(bucket, clicks)| StatPoint { bucket, clicks })
        .collect()
}

/// Trailing 7 UTC days inclusive of today, every day present and
/// zero-filled. An all-zero week is the flat zero-line already.
pub fn week_series(day_start: i64, raw: Vec<ClickBucket>) -> Vec<StatPoint> {
    let range_start = day_start - 6 * DAY_SECS;
    let mut series = Vec::with_capacity(7);
    let mut raw = raw.into_iter().peekable();

    for day in 0..7 {
        let bucket = range_start + day * DAY_SECS;
        let clicks = match raw.peek() {
            Some(&(b, c)) if b == bucket => {
                raw.next();
                c
            }
            _ => 0,
        };
        series.push(StatPoint { bucket, clicks });
    }
    series
}

/// Rollup of language tags over all history; events without a tag form
/// their own bucket rather than being dropped.
pub fn language_rollup(raw: Vec<(Option<String>, i64)>) -> Vec<LanguageCount> {
    raw.into_iter()
        .map(|(lang, clicks)| LanguageCount {
            lang: lang.unwrap_or_else(|| "unknown".to_string()),
            clicks,
        })
        .collect()
}

pub struct StatsService {
    storage: Arc<dyn Storage>,
}

impl StatsService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn series(&self, link_id: i64, granularity: Granularity) -> Result<Vec<StatPoint>> {
        self.series_at(link_id, granularity, Utc::now()).await
    }

    /// Same as `series` with an explicit reference instant, for tests.
    pub async fn series_at(
        &self,
        link_id: i64,
        granularity: Granularity,
        now: DateTime<Utc>,
    ) -> Result<Vec<StatPoint>> {
        let day_start = utc_day_start(now);

        match granularity {
            Granularity::Hour => {
                let raw = self
                    .storage
                    .click_buckets(link_id, HOUR_SECS, Some((day_start, day_start + DAY_SECS)))
                    .await?;
                Ok(hour_series(day_start, raw))
            }
            Granularity::Day => {
                let raw = self.storage.click_buckets(link_id, DAY_SECS, None).await?;
                Ok(day_series(raw))
            }
            Granularity::Week => {
                let range_start = day_start - 6 * DAY_SECS;
                let raw = self
                    .storage
                    .click_buckets(link_id, DAY_SECS, Some((range_start, day_start + DAY_SECS)))
                    .await?;
                Ok(week_series(day_start, raw))
            }
        }
    }

    pub async fn languages(&self, link_id: i64) -> Result<Vec<LanguageCount>> {
        let raw = self.storage.language_counts(link_id).await?;
        Ok(language_rollup(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_start_is_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 37, 11).unwrap();
        let start = utc_day_start(now);
        assert_eq!(start % DAY_SECS, 0);
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn empty_hour_series_is_two_point_zero_line() {
        let day_start = 1_700_006_400; // some UTC midnight
        let series = hour_series(day_start, vec![]);
        assert_eq!(
            series,
            vec![
                StatPoint { bucket: day_start, clicks: 0 },
                StatPoint { bucket: day_start + DAY_SECS, clicks: 0 },
            ]
        );
    }

    #[test]
    fn hour_series_keeps_observed_buckets() {
        let day_start = 1_700_006_400;
        let series = hour_series(
            day_start,
            vec![(day_start + 3 * HOUR_SECS, 2), (day_start + 10 * HOUR_SECS, 5)],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].clicks, 2);
        assert_eq!(series[1].bucket, day_start + 10 * HOUR_SECS);
    }

    #[test]
    fn week_series_zero_fills_all_seven_days() {
        let day_start = 1_700_006_400;
        let series = week_series(day_start, vec![]);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].bucket, day_start - 6 * DAY_SECS);
        assert_eq!(series[6].bucket, day_start);
        assert!(series.iter().all(|p| p.clicks == 0));
    }

    #[test]
    fn week_series_merges_observed_days_into_filled_range() {
        let day_start = 1_700_006_400;
        let series = week_series(
            day_start,
            vec![(day_start - 3 * DAY_SECS, 4), (day_start, 1)],
        );
        assert_eq!(series.len(), 7);
        assert_eq!(series[3].clicks, 4);
        assert_eq!(series[6].clicks, 1);
        assert_eq!(series[0].clicks, 0);
    }

    #[test]
    fn day_series_has_no_gap_filling() {
        let series = day_series(vec![(0, 1), (5 * DAY_SECS, 2)]);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn language_rollup_buckets_missing_tags() {
        let rolled = language_rollup(vec![
            (Some("en".to_string()), 10),
            (None, 3),
            (Some("de".to_string()), 1),
        ]);
        assert_eq!(rolled.len(), 3);
        assert!(rolled.iter().any(|r| r.lang == "unknown" && r.clicks == 3));
    }
}
