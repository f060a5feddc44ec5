//! End-to-end tests for the referral sync agent.
//!
//! A file store in a temp directory stands in for browser storage and a mock
//! storefront stands in for Shopify.

use std::time::Duration;

use referral_sync::{
    CartEvents, FileStore, ReconcileOutcome, RecordStore, ReferralSyncAgent,
    config::DEFAULT_STORAGE_KEY,
};
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use referral_sync_integration_tests::{TestStore, cart_document};

fn page(raw: &str) -> Url {
    Url::parse(raw).expect("valid page URL")
}

fn file_store(dir: &TempDir) -> FileStore {
    FileStore::open(dir.path()).expect("store opens")
}

async fn mount_cart(store: &TestStore, attributes: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/cart.js"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_document(&attributes)))
        .mount(&store.server)
        .await;
}

async fn mount_update(store: &TestStore, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/cart/update.js"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_document(&json!({}))))
        .expect(expected_calls)
        .mount(&store.server)
        .await;
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn test_startup_writes_referral_to_empty_cart() {
    let store = TestStore::start().await;
    mount_cart(&store, json!({})).await;
    mount_update(&store, 1).await;

    let dir = TempDir::new().expect("temp dir");
    let events = CartEvents::new();
    let handle = ReferralSyncAgent::initialize(
        file_store(&dir),
        store.client(),
        &events,
        &page("https://shop.test/products/tee?ref=store1"),
    );

    let outcome = handle.startup.await.expect("startup task completes");
    assert!(matches!(outcome, ReconcileOutcome::Updated(fields) if fields.code && !fields.order_id));

    let bodies = store.update_bodies().await;
    assert_eq!(bodies.len(), 1);
    let attributes = &bodies[0]["attributes"];
    assert_eq!(attributes["referral_code"], "store1");
    assert_eq!(attributes["landingPage"], "/products/tee");
    assert!(attributes["capturedAt"].is_string());
    assert!(attributes.get("order_id").is_none());

    handle.listener.abort();
}

#[tokio::test]
async fn test_startup_skips_write_when_cart_in_sync() {
    let store = TestStore::start().await;
    mount_cart(&store, json!({"referral_code": "store1", "order_id": "99"})).await;
    mount_update(&store, 0).await;

    let dir = TempDir::new().expect("temp dir");
    let events = CartEvents::new();
    let handle = ReferralSyncAgent::initialize(
        file_store(&dir),
        store.client(),
        &events,
        &page("https://shop.test/?ref=store1&order_id=99"),
    );

    assert_eq!(
        handle.startup.await.expect("startup task completes"),
        ReconcileOutcome::InSync
    );
    handle.listener.abort();
}

#[tokio::test]
async fn test_partial_match_sends_both_identifiers() {
    let store = TestStore::start().await;
    mount_cart(&store, json!({"referral_code": "store1"})).await;
    mount_update(&store, 1).await;

    let dir = TempDir::new().expect("temp dir");
    let agent = ReferralSyncAgent::new(file_store(&dir), store.client());
    agent.capture(&page("https://shop.test/?ref=store1&order_id=99"));

    assert!(matches!(
        agent.reconcile().await,
        ReconcileOutcome::Updated(_)
    ));

    let bodies = store.update_bodies().await;
    assert_eq!(bodies[0]["attributes"]["referral_code"], "store1");
    assert_eq!(bodies[0]["attributes"]["order_id"], "99");
}

#[tokio::test]
async fn test_cart_outage_keeps_record_for_next_trigger() {
    let store = TestStore::start().await;
    Mock::given(method("GET"))
        .and(path("/cart.js"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&store.server)
        .await;
    mount_update(&store, 0).await;

    let dir = TempDir::new().expect("temp dir");
    let events = CartEvents::new();
    let handle = ReferralSyncAgent::initialize(
        file_store(&dir),
        store.client(),
        &events,
        &page("https://shop.test/?order_id=1001"),
    );

    assert_eq!(
        handle.startup.await.expect("startup task completes"),
        ReconcileOutcome::Failed
    );
    let record = handle.agent.read_record().expect("record persisted");
    assert_eq!(record.order_id.map(String::from).as_deref(), Some("1001"));
    handle.listener.abort();
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn test_each_notification_triggers_reconciliation() {
    let store = TestStore::start().await;
    mount_cart(&store, json!({})).await;
    mount_update(&store, 3).await;

    let dir = TempDir::new().expect("temp dir");
    let events = CartEvents::new();
    let handle = ReferralSyncAgent::initialize(
        file_store(&dir),
        store.client(),
        &events,
        &page("https://shop.test/?ref=store1"),
    );
    handle.startup.await.expect("startup task completes");

    // The mock cart never keeps attributes, so every trigger writes again.
    events.notify();
    events.notify();

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.update_bodies().await.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notifications reconciled");
    assert_eq!(store.fetch_count().await, 3);

    handle.listener.abort();
}

// =============================================================================
// Persistence across page loads
// =============================================================================

#[tokio::test]
async fn test_record_survives_page_loads() {
    let store = TestStore::start().await;
    let dir = TempDir::new().expect("temp dir");

    let first = ReferralSyncAgent::new(file_store(&dir), store.client());
    first.capture(&page("https://shop.test/?ref=A&order_id=B"));

    let second = ReferralSyncAgent::new(file_store(&dir), store.client());
    second.capture(&page("https://shop.test/collections/all?ref=C"));

    let record = second.read_record().expect("record persisted");
    assert_eq!(record.code.map(String::from).as_deref(), Some("C"));
    assert_eq!(record.order_id.map(String::from).as_deref(), Some("B"));
    assert_eq!(second.current_code().map(String::from).as_deref(), Some("C"));
}

#[tokio::test]
async fn test_clear_removes_record_file() {
    let store = TestStore::start().await;
    let dir = TempDir::new().expect("temp dir");

    let agent = ReferralSyncAgent::new(file_store(&dir), store.client());
    agent.capture(&page("https://shop.test/?ref=A"));
    assert!(dir.path().join(format!("{DEFAULT_STORAGE_KEY}.json")).exists());

    agent.clear();
    assert!(agent.read_record().is_none());
    assert_eq!(
        agent.store().get(DEFAULT_STORAGE_KEY).expect("store readable"),
        None
    );
}

#[tokio::test]
async fn test_malformed_file_is_ignored() {
    let store = TestStore::start().await;
    mount_update(&store, 0).await;
    let dir = TempDir::new().expect("temp dir");

    let files = file_store(&dir);
    files
        .set(DEFAULT_STORAGE_KEY, "{\"code\":")
        .expect("raw write succeeds");

    let agent = ReferralSyncAgent::new(files, store.client());
    assert!(agent.read_record().is_none());
    assert_eq!(agent.reconcile().await, ReconcileOutcome::NoRecord);
    assert_eq!(store.fetch_count().await, 0);
}
