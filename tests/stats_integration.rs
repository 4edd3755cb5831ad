//! Integration tests for click-statistics aggregation against in-memory
//! SQLite, with a pinned reference instant so bucket boundaries are exact.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lariat::stats::{Granularity, StatsService};
use lariat::storage::{SqliteStorage, Storage};

const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

async fn create_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// 2024-03-15 13:37:11 UTC.
fn reference_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 13, 37, 11).unwrap()
}

fn day_start() -> i64 {
    Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap().timestamp()
}

#[tokio::test]
async fn hour_series_with_no_clicks_today_is_flat_zero_line() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    // A click well before today must not leak into the hourly window.
    storage.record_click(1, day_start() - 3 * DAY, None).await.unwrap();

    let series = stats
        .series_at(1, Granularity::Hour, reference_now())
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].bucket, day_start());
    assert_eq!(series[1].bucket, day_start() + DAY);
    assert!(series.iter().all(|p| p.clicks == 0));
}

#[tokio::test]
async fn hour_series_buckets_todays_clicks() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    let start = day_start();
    storage.record_click(1, start + 9 * HOUR + 10, None).await.unwrap();
    storage.record_click(1, start + 9 * HOUR + 50, None).await.unwrap();
    storage.record_click(1, start + 14 * HOUR, None).await.unwrap();
    // Yesterday, excluded.
    storage.record_click(1, start - HOUR, None).await.unwrap();

    let series = stats
        .series_at(1, Granularity::Hour, reference_now())
        .await
        .unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].bucket, start + 9 * HOUR);
    assert_eq!(series[0].clicks, 2);
    assert_eq!(series[1].bucket, start + 14 * HOUR);
    assert_eq!(series[1].clicks, 1);
}

#[tokio::test]
async fn week_series_with_only_old_clicks_is_seven_zeros() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    // Clicks 10 days ago fall outside the trailing window.
    storage.record_click(1, day_start() - 10 * DAY, None).await.unwrap();
    storage.record_click(1, day_start() - 10 * DAY + 60, None).await.unwrap();

    let series = stats
        .series_at(1, Granularity::Week, reference_now())
        .await
        .unwrap();

    assert_eq!(series.len(), 7);
    assert_eq!(series[0].bucket, day_start() - 6 * DAY);
    assert_eq!(series[6].bucket, day_start());
    assert!(series.iter().all(|p| p.clicks == 0));
}

#[tokio::test]
async fn week_series_gap_fills_between_observed_days() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    let start = day_start();
    storage.record_click(1, start - 5 * DAY + 30, None).await.unwrap();
    storage.record_click(1, start - 5 * DAY + 90, None).await.unwrap();
    storage.record_click(1, start + 2 * HOUR, None).await.unwrap();

    let series = stats
        .series_at(1, Granularity::Week, reference_now())
        .await
        .unwrap();

    assert_eq!(series.len(), 7);
    assert_eq!(series[1].bucket, start - 5 * DAY);
    assert_eq!(series[1].clicks, 2);
    assert_eq!(series[6].clicks, 1);
    // Days without events are present as zeros, not missing.
    assert_eq!(series[2].clicks, 0);
    assert_eq!(series[0].clicks, 0);
}

#[tokio::test]
async fn day_series_spans_all_history_without_gap_filling() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    let start = day_start();
    storage.record_click(1, start - 30 * DAY, None).await.unwrap();
    storage.record_click(1, start - 30 * DAY + 60, None).await.unwrap();
    storage.record_click(1, start + HOUR, None).await.unwrap();

    let series = stats
        .series_at(1, Granularity::Day, reference_now())
        .await
        .unwrap();

    // Two observed days, 29 silent days omitted.
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].bucket, start - 30 * DAY);
    assert_eq!(series[0].clicks, 2);
    assert_eq!(series[1].bucket, start);
    assert_eq!(series[1].clicks, 1);
}

#[tokio::test]
async fn language_breakdown_keeps_unknown_bucket() {
    let storage = create_storage().await;
    let stats = StatsService::new(Arc::clone(&storage));

    storage.record_click(1, 1_700_000_000, Some("en-US")).await.unwrap();
    storage.record_click(1, 1_700_000_010, Some("en-US")).await.unwrap();
    storage.record_click(1, 1_700_000_020, Some("de")).await.unwrap();
    storage.record_click(1, 1_700_000_030, None).await.unwrap();
    // A different link's events stay out of the rollup.
    storage.record_click(2, 1_700_000_040, Some("fr")).await.unwrap();

    let rollup = stats.languages(1).await.unwrap();

    assert_eq!(rollup.len(), 3);
    assert!(rollup.iter().any(|r| r.lang == "en-US" && r.clicks == 2));
    assert!(rollup.iter().any(|r| r.lang == "de" && r.clicks == 1));
    assert!(rollup.iter().any(|r| r.lang == "unknown" && r.clicks == 1));
    assert!(!rollup.iter().any(|r| r.lang == "fr"));
}

#[tokio::test]
async fn counter_and_events_move_together() {
    let storage = create_storage().await;

    // record_click for an id with no link row still appends the event; the
    // lifecycle only calls it for resolved links.
    storage.record_click(7, 1_700_000_000, Some("en")).await.unwrap();
    let buckets = storage.click_buckets(7, DAY, None).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].1, 1);
}
