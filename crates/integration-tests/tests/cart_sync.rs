//! End-to-end cart synchronization scenarios.
//!
//! The engine runs against the real HTTP gateway and JSON file cache; the
//! storefront API is the in-process mock from this crate.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use tidewear_cart::{
    CartError, HttpCartGateway, IdentityBridge, JsonFilePersistence, LoadFailure, RemoteError,
    SyncEngine, SyncFailure, Transition, ValidationError, follow_identity,
};
use tidewear_core::{CartMode, ProductId, Size};
use tidewear_integration_tests::{MockCartApi, product};

type Engine = SyncEngine<JsonFilePersistence, HttpCartGateway>;

fn size(raw: &str) -> Size {
    Size::parse(raw).expect("valid size")
}

async fn start_api() -> MockCartApi {
    MockCartApi::start([
        product(1, "Harbor Tee", Decimal::new(2450, 2), 5),
        product(2, "Dune Hoodie", Decimal::new(6000, 2), 2),
        product(3, "Reef Shorts", Decimal::new(3500, 2), 10),
    ])
    .await
}

fn engine(api: &MockCartApi, dir: &tempfile::TempDir) -> Engine {
    SyncEngine::new(
        JsonFilePersistence::new(dir.path().join("cart.json")),
        HttpCartGateway::new(api.base_url()),
    )
    .with_remote_timeout(Duration::from_secs(2))
}

// ============================================================================
// Guest Mode
// ============================================================================

#[tokio::test]
async fn test_guest_cart_survives_restart() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");

    let first = engine(&api, &dir);
    first.observe(None).await.expect("guest load");
    let tee = first.remote().get_product(ProductId::new(1)).await.expect("product");
    let hoodie = first.remote().get_product(ProductId::new(2)).await.expect("product");
    first.add(&tee, size("M"), 2).await.expect("add tee");
    first.add(&hoodie, size("L"), 1).await.expect("add hoodie");
    first.flush().await.expect("flush");
    drop(first);

    let second = engine(&api, &dir);
    assert_eq!(second.observe(None).await.expect("guest load"), Transition::Guest);

    let state = second.snapshot().await;
    assert_eq!(state.mode, CartMode::Guest);
    assert_eq!(state.lines.len(), 2);
    assert_eq!(state.lines[0].product_id, ProductId::new(1));
    assert_eq!(state.lines[0].quantity, 2);
    assert_eq!(second.total().await, Decimal::new(10900, 2));
}

#[tokio::test]
async fn test_guest_stock_check_uses_cart_quantity() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine(&api, &dir);
    engine.observe(None).await.expect("guest load");
    let hoodie = engine.remote().get_product(ProductId::new(2)).await.expect("product");

    engine.add(&hoodie, size("M"), 2).await.expect("add");
    let err = engine.add(&hoodie, size("M"), 1).await.expect_err("over stock");

    assert!(matches!(
        err,
        CartError::Validation(ValidationError::OutOfStock { .. })
    ));
    assert_eq!(err.user_message(), "Sorry, only 2 items available in stock.");
    assert_eq!(api.request_count().await, 1);
}

#[tokio::test]
async fn test_corrupt_guest_file_reads_as_empty() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("cart.json"), "{ not json").expect("write");

    let engine = engine(&api, &dir);
    engine.observe(None).await.expect("guest load");

    assert!(engine.snapshot().await.is_empty());
}

// ============================================================================
// Identity Transitions
// ============================================================================

#[tokio::test]
async fn test_sign_in_replaces_and_sign_out_restores_guest_cart() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    api.seed(&alice, 3, "S", 1).await;

    let engine = engine(&api, &dir);
    engine.observe(None).await.expect("guest load");
    let tee = engine.remote().get_product(ProductId::new(1)).await.expect("product");
    engine.add(&tee, size("M"), 1).await.expect("guest add");

    let transition = engine.observe(Some(alice.clone())).await.expect("sign in");
    assert_eq!(transition, Transition::Authenticated);
    let state = engine.snapshot().await;
    assert_eq!(state.mode, CartMode::Authenticated);
    assert_eq!(state.lines.len(), 1);
    assert_eq!(state.lines[0].product_id, ProductId::new(3));
    // Guest lines are not carried into the account cart.
    assert_eq!(api.cart_items(&alice).await, vec![(3, "S".to_string(), 1)]);

    let transition = engine.observe(None).await.expect("sign out");
    assert_eq!(transition, Transition::Guest);
    let state = engine.snapshot().await;
    assert_eq!(state.mode, CartMode::Guest);
    assert_eq!(state.lines.len(), 1);
    assert_eq!(state.lines[0].product_id, ProductId::new(1));
}

#[tokio::test]
async fn test_rejected_token_stays_guest() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine(&api, &dir);
    engine.observe(None).await.expect("guest load");

    let err = engine
        .observe(Some(tidewear_core::Credential::new("expired")))
        .await
        .expect_err("unknown token");

    assert!(matches!(
        err,
        CartError::Load(LoadFailure::Remote(RemoteError::Unauthorized))
    ));
    assert!(err.is_unauthorized());
    assert_eq!(engine.mode().await, CartMode::Guest);
}

#[tokio::test]
async fn test_failed_sign_in_retries_on_next_emission() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    api.seed(&alice, 1, "M", 2).await;
    let engine = engine(&api, &dir);
    engine.observe(None).await.expect("guest load");

    api.force_status(Some(StatusCode::SERVICE_UNAVAILABLE)).await;
    let err = engine.observe(Some(alice.clone())).await.expect_err("server down");
    assert!(matches!(
        err,
        CartError::Load(LoadFailure::Remote(RemoteError::Status { status: 503, .. }))
    ));
    assert_eq!(engine.mode().await, CartMode::Guest);

    api.force_status(None).await;
    let transition = engine.observe(Some(alice)).await.expect("retry");
    assert_eq!(transition, Transition::Authenticated);
    assert_eq!(engine.item_count().await, 2);
}

#[tokio::test]
async fn test_identity_bridge_drives_engine() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    api.seed(&alice, 2, "L", 1).await;

    let engine = Arc::new(engine(&api, &dir));
    let bridge = IdentityBridge::default();
    let follower = tokio::spawn(follow_identity(Arc::clone(&engine), bridge.subscribe()));

    bridge.sign_in(alice);
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.mode().await != CartMode::Authenticated {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("engine never switched to the account cart");
    assert_eq!(engine.total().await, Decimal::new(6000, 2));

    drop(bridge);
    follower.await.expect("follower task");
}

// ============================================================================
// Authenticated Mutations
// ============================================================================

#[tokio::test]
async fn test_authenticated_mutations_follow_server() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    let engine = engine(&api, &dir);
    engine.observe(Some(alice.clone())).await.expect("sign in");
    let tee = engine.remote().get_product(ProductId::new(1)).await.expect("product");
    let shorts = engine.remote().get_product(ProductId::new(3)).await.expect("product");

    engine.add(&tee, size("M"), 1).await.expect("add tee");
    engine.add(&shorts, size("S"), 2).await.expect("add shorts");
    let state = engine.add(&tee, size("M"), 1).await.expect("add tee again");
    assert_eq!(state.lines.len(), 2);
    assert!(state.lines.iter().all(|line| line.line_id.is_some()));
    assert_eq!(
        api.cart_items(&alice).await,
        vec![(1, "M".to_string(), 2), (3, "S".to_string(), 2)]
    );

    engine.update(ProductId::new(3), size("S"), 4).await.expect("update");
    assert_eq!(api.cart_items(&alice).await[1], (3, "S".to_string(), 4));

    engine.update(ProductId::new(1), size("M"), 0).await.expect("update to zero");
    assert_eq!(api.cart_items(&alice).await, vec![(3, "S".to_string(), 4)]);

    engine.remove(ProductId::new(3), size("S")).await.expect("remove");
    assert!(api.cart_items(&alice).await.is_empty());

    engine.add(&tee, size("L"), 1).await.expect("add");
    let state = engine.clear().await.expect("clear");
    assert!(state.is_empty());
    assert!(api.cart_items(&alice).await.is_empty());

    // The guest slot is never written while signed in.
    assert!(!dir.path().join("cart.json").exists());
}

#[tokio::test]
async fn test_server_stock_rejection_rolls_back() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    let engine = engine(&api, &dir);
    engine.observe(Some(alice)).await.expect("sign in");
    let tee = engine.remote().get_product(ProductId::new(1)).await.expect("product");

    api.set_stock(1, 1).await;
    let err = engine.add(&tee, size("M"), 3).await.expect_err("server rejects");

    assert!(matches!(
        err,
        CartError::Sync(SyncFailure::Remote(RemoteError::Rejected(ref detail))) if detail == "Not enough stock"
    ));
    assert!(engine.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_slow_server_times_out_and_rolls_back() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    let engine = engine(&api, &dir).with_remote_timeout(Duration::from_millis(150));
    engine.observe(Some(alice)).await.expect("sign in");
    let tee = engine.remote().get_product(ProductId::new(1)).await.expect("product");

    api.set_delay(Duration::from_millis(600)).await;
    let err = engine.add(&tee, size("M"), 1).await.expect_err("timeout");

    assert!(matches!(err, CartError::Sync(SyncFailure::Timeout(_))));
    assert!(engine.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_rejected_token_during_add_keeps_server_change() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    let engine = Arc::new(engine(&api, &dir));
    engine.observe(Some(alice.clone())).await.expect("sign in");
    let tee = engine.remote().get_product(ProductId::new(1)).await.expect("product");

    api.set_delay(Duration::from_millis(300)).await;
    let add = {
        let engine = Arc::clone(&engine);
        let tee = tee.clone();
        tokio::spawn(async move { engine.add(&tee, size("M"), 1).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = engine
        .observe(Some(tidewear_core::Credential::new("rejected-refresh")))
        .await
        .expect_err("unknown token");
    assert!(err.is_unauthorized());

    let state = add.await.expect("task").expect("add");
    assert_eq!(state.quantity_of(ProductId::new(1), &size("M")), 1);
    assert_eq!(engine.mode().await, CartMode::Authenticated);
    assert_eq!(api.cart_items(&alice).await, vec![(1, "M".to_string(), 1)]);

    api.set_delay(Duration::ZERO).await;
    engine.add(&tee, size("M"), 1).await.expect("add again");
    assert_eq!(api.cart_items(&alice).await, vec![(1, "M".to_string(), 2)]);
    assert_eq!(
        engine.snapshot().await.quantity_of(ProductId::new(1), &size("M")),
        2
    );
}

#[tokio::test]
async fn test_concurrent_adds_are_not_lost() {
    let api = start_api().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = api.register("alice-token").await;
    let engine = Arc::new(engine(&api, &dir));
    engine.observe(Some(alice.clone())).await.expect("sign in");
    let shorts = engine.remote().get_product(ProductId::new(3)).await.expect("product");

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let shorts = shorts.clone();
            tokio::spawn(async move { engine.add(&shorts, size("M"), 1).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task").expect("add");
    }

    assert_eq!(api.cart_items(&alice).await, vec![(3, "M".to_string(), 6)]);
    assert_eq!(
        engine.snapshot().await.quantity_of(ProductId::new(3), &size("M")),
        6
    );
}
