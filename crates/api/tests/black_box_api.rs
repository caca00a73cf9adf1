use assetbook_api::app::{build_app, AppServices};
use assetbook_core::Money;
use assetbook_depreciation::{Asset, AssetStatus, DepreciationMethod};
use assetbook_infra::InMemoryLedgerStore;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    store: InMemoryLedgerStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an in-memory store the test can seed.
        let store = InMemoryLedgerStore::new();
        let app = build_app(AppServices::in_memory(store.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn seed(&self, asset: Asset) -> String {
        let id = asset.id.to_string();
        self.store.insert_asset(asset).unwrap();
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn catch_up_asset() -> Asset {
    Asset::new(
        "FA-B",
        DepreciationMethod::StraightLine,
        Money::from_major(12_000_000),
        Money::ZERO,
    )
    .with_useful_life(60)
    .with_start_date(date(2026, 4, 18))
}

fn service_hours_asset() -> Asset {
    Asset::new(
        "FA-HRS",
        DepreciationMethod::ServiceHours,
        Money::from_major(10_000_000),
        Money::from_major(1_000_000),
    )
    .with_service_hours(9_000)
    .with_start_date(date(2026, 1, 1))
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn batch_run_catches_up_and_rerun_reproduces() {
    let srv = TestServer::spawn().await;
    let id = srv.seed(catch_up_asset());
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({ "target_period": "2026-10-18", "asset_ids": [id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["target_period"], "2026-10");
    assert_eq!(body["total_periods"], 6);
    assert_eq!(body["total_amount"], "1200000.00");
    assert_eq!(body["assets"][0]["asset_code"], "FA-B");
    assert_eq!(body["assets"][0]["outcome"], "rebuilt");

    let res = client
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({ "target_period": "2026-10-18" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_periods"], 0);
    assert_eq!(body["total_reproduced"], 6);
    assert_eq!(body["total_amount"], "0.00");

    let res = client
        .get(format!("{}/assets/{}/depreciation", srv.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ledger: serde_json::Value = res.json().await.unwrap();
    let items = ledger["items"].as_array().unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(items[0]["period"], "2026-05");
    assert_eq!(items[5]["book_value_after"], "10800000.00");
    assert_eq!(ledger["accumulated_depreciation"], "1200000.00");
}

#[tokio::test]
async fn usage_accepts_number_or_string_and_guards_duplicates() {
    let srv = TestServer::spawn().await;
    let id = srv.seed(service_hours_asset());
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({
            "target_period": "2026-10-31",
            "asset_ids": [id],
            "usage": { id.clone(): 100 },
            "note": "October hours",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["assets"][0]["outcome"], "usage_processed");
    assert_eq!(body["assets"][0]["period"], "2026-10");
    assert_eq!(body["assets"][0]["amount_total"], "100000.00");

    let res = client
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({
            "target_period": "2026-10-31",
            "asset_ids": [id],
            "usage": { id.clone(): "100" },
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["assets"][0]["outcome"], "skipped");
    assert_eq!(body["total_amount"], "0.00");
}

#[tokio::test]
async fn per_asset_failures_are_reported_not_fatal() {
    let srv = TestServer::spawn().await;
    let ok = srv.seed(catch_up_asset());
    let hours = srv.seed(service_hours_asset());
    let no_start = srv.seed(Asset::new(
        "FA-NODATE",
        DepreciationMethod::StraightLine,
        Money::from_major(1_000),
        Money::ZERO,
    )
    .with_useful_life(10));
    let inactive = srv.seed(catch_up_asset().with_status(AssetStatus::Disposed));

    let res = reqwest::Client::new()
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({
            "target_period": "2026-10-18",
            "asset_ids": [ok, hours, no_start, inactive],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let assets = body["assets"].as_array().unwrap();

    assert_eq!(assets[0]["outcome"], "rebuilt");
    assert_eq!(assets[1]["error"]["code"], "invalid_usage");
    assert_eq!(assets[1]["error"]["skipped"], true);
    assert_eq!(assets[2]["error"]["code"], "missing_start_date");
    assert_eq!(assets[3]["outcome"], "not_eligible");
    assert_eq!(body["failures"], 2);
    assert_eq!(body["total_periods"], 6);
}

#[tokio::test]
async fn preview_does_not_write() {
    let srv = TestServer::spawn().await;
    let id = srv.seed(catch_up_asset());
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/assets/{}/depreciation/preview?target=2026-10-18",
            srv.base_url, id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["missing_periods"].as_array().unwrap().len(), 6);
    assert_eq!(body["plan"]["kind"], "rebuild");
    assert_eq!(body["plan"]["accumulated"], "1200000.00");

    let ledger: serde_json::Value = client
        .get(format!("{}/assets/{}/depreciation", srv.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ledger["items"].as_array().unwrap().is_empty());

    let res = client
        .get(format!(
            "{}/assets/{}/depreciation/preview?target=October",
            srv.base_url, id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn journal_posting_links_records() {
    let srv = TestServer::spawn().await;
    let id = srv.seed(catch_up_asset());
    let client = reqwest::Client::new();

    client
        .post(format!("{}/depreciation/runs", srv.base_url))
        .json(&json!({ "target_period": "2026-10-18" }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/assets/{}/depreciation/journal", srv.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["posted"].as_array().unwrap().len(), 6);
    assert_eq!(body["posted_amount"], "1200000.00");

    let ledger: serde_json::Value = client
        .get(format!("{}/assets/{}/depreciation", srv.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ledger["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["journal_ref"].is_string()));
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/assets/0190b5a4-0000-7000-8000-000000000099/depreciation",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = client
        .post(format!("{}/assets/not-an-id/depreciation/journal", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
