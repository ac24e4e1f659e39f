use axum::http::StatusCode;
use franc_exchange::api::{self, AppState};
use franc_exchange::db::init_db;
use franc_exchange::{Exchange, ExchangeSettings, FlushPolicy, Repository, Store, UserId};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    exchange: Arc<Exchange>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let store = Arc::new(Store::new(
        Arc::new(Repository::new(pool)),
        FlushPolicy::EveryN(50),
    ));
    let settings = ExchangeSettings {
        random_seed: Some(11),
        ..ExchangeSettings::default()
    };
    let exchange = Arc::new(Exchange::new(store, settings));

    TestApp {
        app: api::create_router(AppState::new(exchange.clone())),
        exchange,
        _temp: temp_dir,
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app().await;

    let (status, body) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&t.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_signal_then_lookup_index() {
    let t = setup_test_app().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/signals",
        Some(json!({ "instrument": "x", "value": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instrument"], "X");
    assert_eq!(body["applied"], 500.0);
    assert_eq!(body["clamped"], false);

    let (status, body) = send(&t.app, "GET", "/v1/indexes/X", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 500.0);
    assert_eq!(body["segments"].as_array().unwrap().len(), 1);

    let (status, body) = send(&t.app, "GET", "/v1/indexes/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn test_non_positive_signal_is_bad_request() {
    let t = setup_test_app().await;
    let (status, _) = send(
        &t.app,
        "POST",
        "/v1/signals",
        Some(json!({ "instrument": "X", "value": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_refresh_lists_catalog() {
    let t = setup_test_app().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/activity",
        Some(json!({ "voiceMembers": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["FURALL", "FURAT", "FUROM", "FUREY"]);
    assert_eq!(body[0]["price"], 1000.0);

    let (status, body) = send(&t.app, "GET", "/v1/indexes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);

    let (status, body) = send(&t.app, "POST", "/v1/indexes/flush", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flushed"], 4);
}

#[tokio::test]
async fn test_transfer_and_leaderboard() {
    let t = setup_test_app().await;
    t.exchange
        .ledger()
        .set_balance(&UserId::new("A"), 1000)
        .await
        .unwrap();

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/transfers",
        Some(json!({ "from": "A", "to": "B", "amount": 400 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"]["balance"], 600);
    assert_eq!(body["to"]["balance"], 400);

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/transfers",
        Some(json!({ "from": "B", "to": "A", "amount": 401 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("insufficient funds"));

    let (status, body) = send(&t.app, "GET", "/v1/balances/B", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 400);

    let (status, body) = send(&t.app, "GET", "/v1/leaderboard?limit=1&offset=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["rank"], 2);
    assert_eq!(body[0]["user"], "B");

    let (status, _) = send(&t.app, "GET", "/v1/leaderboard?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&t.app, "GET", "/v1/circulation", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1000.0);
}

#[tokio::test]
async fn test_trade_roundtrip_and_portfolio() {
    let t = setup_test_app().await;
    t.exchange
        .ledger()
        .set_balance(&UserId::new("u1"), 1000)
        .await
        .unwrap();
    send(
        &t.app,
        "POST",
        "/v1/signals",
        Some(json!({ "instrument": "FURAT", "value": 100 })),
    )
    .await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/trades",
        Some(json!({ "user": "u1", "instrument": "furat", "side": "buy", "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 400);
    assert_eq!(body["balance"], 600);
    assert_eq!(body["position"]["count"], 4);

    let (status, body) = send(&t.app, "GET", "/v1/portfolio/u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["holdings"][0]["marketValue"], 400.0);
    assert_eq!(body["totalValue"], 1000.0);

    let (status, body) = send(
        &t.app,
        "POST",
        "/v1/trades",
        Some(json!({ "user": "u1", "instrument": "FURAT", "side": "sell" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["realizedPnl"], 0);
    assert_eq!(body["position"]["averageCost"], Value::Null);

    let (status, _) = send(
        &t.app,
        "POST",
        "/v1/trades",
        Some(json!({ "user": "u1", "instrument": "FURAT", "side": "sell" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attendance_check_in_twice_conflicts() {
    let t = setup_test_app().await;

    let (status, body) = send(&t.app, "POST", "/v1/attendance/u9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reward"], 100);
    assert_eq!(body["record"]["streak"], 1);

    let (status, _) = send(&t.app, "POST", "/v1/attendance/u9", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_attendance_lookup_and_leaderboards() {
    let t = setup_test_app().await;

    let (status, _) = send(&t.app, "GET", "/v1/attendance/u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let day = |d: u32| chrono::NaiveDate::from_ymd_opt(2026, 8, d).unwrap();
    let steady = UserId::new("steady");
    let lapsed = UserId::new("lapsed");
    for d in 1..=3 {
        t.exchange.check_in_on(&steady, day(d)).await.unwrap();
    }
    for d in 1..=5 {
        t.exchange.check_in_on(&lapsed, day(d)).await.unwrap();
    }
    t.exchange.check_in_on(&lapsed, day(9)).await.unwrap();

    let (status, body) = send(&t.app, "GET", "/v1/attendance/lapsed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["streak"], 1);
    assert_eq!(body["maxStreak"], 5);
    assert_eq!(body["lastDay"], "2026-08-09");

    let (status, body) = send(&t.app, "GET", "/v1/leaderboard/attendance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user"], "steady");
    assert_eq!(body[0]["rank"], 1);
    assert_eq!(body[1]["user"], "lapsed");

    let (status, body) = send(
        &t.app,
        "GET",
        "/v1/leaderboard/attendance?by=maxStreak&limit=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user"], "lapsed");
    assert_eq!(body[0]["maxStreak"], 5);

    let (status, _) = send(&t.app, "GET", "/v1/leaderboard/attendance?limit=101", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
