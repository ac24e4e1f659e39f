use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use franc_exchange::db::init_db;
use franc_exchange::engine::SeriesUpdater;
use franc_exchange::services::IndexEngine;
use franc_exchange::{Decimal, FlushPolicy, InstrumentName, Repository, Store};
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store(temp_dir: &TempDir, policy: FlushPolicy) -> Arc<Store> {
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    Arc::new(Store::new(Arc::new(Repository::new(pool)), policy))
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 14, hour, minute, 0).unwrap()
}

#[tokio::test]
async fn test_segments_have_no_gaps() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, FlushPolicy::Immediate).await;
    let engine = IndexEngine::new(store, SeriesUpdater::default());
    let x = InstrumentName::new("X");

    engine.update_at(&x, d("1000"), at(10, 30)).await.unwrap();
    let outcome = engine.update_at(&x, d("1001"), at(13, 15)).await.unwrap();
    assert_eq!(outcome.segments_closed, 3);

    let series = engine.series(&x).await.unwrap();
    assert_eq!(series.segments.len(), 4);
    assert_eq!(series.closed_segments(), 3);
    for pair in series.segments.windows(2) {
        assert!(pair[0].ended_at.is_some());
        assert_eq!(pair[0].ended_at, pair[1].started_at);
        assert_eq!(pair[1].open_value, pair[0].value);
    }
    assert_eq!(series.segments[1].started_at, Some(at(11, 0)));
    assert_eq!(series.segments[3].started_at, Some(at(13, 0)));
    assert!(series.segments[3].ended_at.is_none());
}

#[tokio::test]
async fn test_rate_limit_bound_holds_for_bursty_input() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, FlushPolicy::Immediate).await;
    let engine = IndexEngine::new(store, SeriesUpdater::default());
    let x = InstrumentName::new("X");

    engine.update_at(&x, d("1000"), at(9, 0)).await.unwrap();
    let mut previous = d("1000");
    let mut now = at(9, 0);
    let steps = [
        (7, "100000"),
        (1, "0.0001"),
        (45, "5000"),
        (90, "1"),
        (3, "999999"),
        (120, "20"),
    ];

    for (minutes, observed) in steps {
        now = now + TimeDelta::minutes(minutes);
        let outcome = engine.update_at(&x, d(observed), now).await.unwrap();
        let hours = Decimal::from_i64(minutes) / Decimal::from_i64(60);
        let bound = previous * d("0.01") * hours;
        assert!(
            (outcome.applied - previous).abs() <= bound,
            "move {} -> {} exceeds {}",
            previous,
            outcome.applied,
            bound
        );
        assert!(outcome.clamped);
        previous = outcome.applied;
    }
}

#[tokio::test]
async fn test_debounced_updates_survive_only_after_flush() {
    let temp_dir = TempDir::new().unwrap();
    let x = InstrumentName::new("FUROM");

    {
        let store = open_store(&temp_dir, FlushPolicy::EveryN(50)).await;
        let engine = IndexEngine::new(store.clone(), SeriesUpdater::default());
        engine.update_at(&x, d("1000"), at(9, 0)).await.unwrap();
        engine.update_at(&x, d("1001"), at(9, 30)).await.unwrap();
        assert_eq!(store.dirty_series(), 1);
    }

    {
        // Nothing reached the database yet.
        let store = open_store(&temp_dir, FlushPolicy::EveryN(50)).await;
        assert!(store.load_series(&x).await.unwrap().is_none());

        let engine = IndexEngine::new(store.clone(), SeriesUpdater::default());
        engine.update_at(&x, d("1000"), at(9, 0)).await.unwrap();
        engine.update_at(&x, d("1003"), at(11, 30)).await.unwrap();
        assert_eq!(engine.flush().await.unwrap(), 1);
        assert_eq!(store.dirty_series(), 0);
    }

    let store = open_store(&temp_dir, FlushPolicy::EveryN(50)).await;
    let engine = IndexEngine::new(store, SeriesUpdater::default());
    assert_eq!(engine.current_price(&x).await.unwrap(), d("1003"));
    assert_eq!(engine.series(&x).await.unwrap().segments.len(), 3);
}

#[tokio::test]
async fn test_every_nth_update_reaches_database() {
    let temp_dir = TempDir::new().unwrap();
    let x = InstrumentName::new("FURAT");
    let store = open_store(&temp_dir, FlushPolicy::EveryN(3)).await;
    let engine = IndexEngine::new(store, SeriesUpdater::default());

    for minute in 0..3 {
        engine
            .update_at(&x, d("500"), at(8, minute))
            .await
            .unwrap();
    }

    let reopened = open_store(&temp_dir, FlushPolicy::EveryN(3)).await;
    let stored = reopened.load_series(&x).await.unwrap().unwrap();
    assert_eq!(stored.last_updated_at, at(8, 2));
}
