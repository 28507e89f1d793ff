//! Cart store against the fake backend over HTTP.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use greenhouse_client::{
    CartGateway, CartStore, ChannelNotifier, GatewayError, HttpGateway, Notice, SyncConfig,
    SyncError,
};
use greenhouse_core::{CartEntryId, Price, ProductId, Quantity};
use greenhouse_integration_tests::FakeBackend;
use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedReceiver;

fn store(backend: &FakeBackend) -> (CartStore<HttpGateway>, UnboundedReceiver<Notice>) {
    let gateway = Arc::new(HttpGateway::new(&backend.api_config()).unwrap());
    let (notifier, notices) = ChannelNotifier::channel();
    let store = CartStore::new(gateway, Arc::new(notifier), &SyncConfig::default());
    (store, notices)
}

fn euros(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2)).unwrap()
}

async fn backend_with_products() -> FakeBackend {
    let backend = FakeBackend::start().await;
    backend.add_product("basil", "Graines de basilic", 1000, 10);
    backend.add_product("sensor", "Capteur d'humidité", 2450, 2);
    backend
}

// =============================================================================
// Happy paths
// =============================================================================

#[tokio::test]
async fn test_refresh_reads_empty_cart() {
    let backend = backend_with_products().await;
    let (store, _notices) = store(&backend);

    store.refresh().await.unwrap();

    let view = store.view();
    assert!(view.items.is_empty());
    assert_eq!(view.total, Price::ZERO);
    assert_eq!(backend.requests(), vec!["GET /api/cart".to_string()]);
}

#[tokio::test]
async fn test_add_then_update_quantity() {
    let backend = backend_with_products().await;
    let (store, _notices) = store(&backend);

    store
        .add_item(ProductId::new("basil"), Quantity::new(2).unwrap())
        .await
        .unwrap();
    let entry_id = store.view().items[0].id.clone();

    store.update_quantity(entry_id, 3).await.unwrap();

    let view = store.view();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity.get(), 3);
    assert_eq!(view.total, euros(3000));
    assert_eq!(view.item_count, 3);
    assert_eq!(backend.cart()[0].quantity.get(), 3);
}

#[tokio::test]
async fn test_total_follows_server_not_local_sum() {
    let backend = backend_with_products().await;
    backend.set_discount(Decimal::new(500, 2));
    let (store, _notices) = store(&backend);

    store
        .add_item(ProductId::new("basil"), Quantity::ONE)
        .await
        .unwrap();
    assert_eq!(store.total(), euros(500));

    store
        .add_item(ProductId::new("sensor"), Quantity::ONE)
        .await
        .unwrap();
    assert_eq!(store.total(), euros(2950));

    let basil = store
        .view()
        .items
        .into_iter()
        .find(|entry| entry.product_id.as_str() == "basil")
        .unwrap();
    store.remove_item(basil.id).await.unwrap();
    assert_eq!(store.total(), euros(1950));

    store.clear().await.unwrap();
    assert_eq!(store.total(), Price::ZERO);
    assert!(store.view().items.is_empty());
}

#[tokio::test]
async fn test_quantity_below_one_sends_nothing() {
    let backend = backend_with_products().await;
    let (store, _notices) = store(&backend);
    store
        .add_item(ProductId::new("basil"), Quantity::new(2).unwrap())
        .await
        .unwrap();
    let entry_id = store.view().items[0].id.clone();
    let requests_before = backend.requests().len();

    store.update_quantity(entry_id, 0).await.unwrap();

    assert_eq!(backend.requests().len(), requests_before);
    assert_eq!(store.view().items[0].quantity.get(), 2);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_rejected_add_keeps_cart_and_shows_server_message() {
    let backend = backend_with_products().await;
    let (store, mut notices) = store(&backend);
    store
        .add_item(ProductId::new("sensor"), Quantity::ONE)
        .await
        .unwrap();
    let before = store.view();

    let result = store
        .add_item(ProductId::new("sensor"), Quantity::new(5).unwrap())
        .await;

    assert_eq!(
        result,
        Err(SyncError::Gateway(GatewayError::ValidationRejected(
            "Stock insuffisant".to_string()
        )))
    );
    assert_eq!(store.view(), before);

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.collection, "cart");
    assert_eq!(notice.message, "Stock insuffisant");
}

#[tokio::test]
async fn test_unknown_entry_is_not_found() {
    let backend = backend_with_products().await;
    let (store, _notices) = store(&backend);

    let result = store.remove_item(CartEntryId::new("missing")).await;

    assert!(matches!(
        result,
        Err(SyncError::Gateway(GatewayError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_server_error_keeps_cart() {
    let backend = backend_with_products().await;
    let (store, mut notices) = store(&backend);
    store
        .add_item(ProductId::new("basil"), Quantity::ONE)
        .await
        .unwrap();

    backend.fail_next(StatusCode::INTERNAL_SERVER_ERROR);
    let result = store.clear().await;

    assert!(matches!(
        result,
        Err(SyncError::Gateway(GatewayError::Server { status: 500, .. }))
    ));
    assert_eq!(store.view().items.len(), 1);
    assert!(!store.is_loading());
    assert!(notices.try_recv().is_ok());
}

#[tokio::test]
async fn test_anonymous_user_gets_silent_unauthorized() {
    let backend = backend_with_products().await;
    let gateway = Arc::new(HttpGateway::new(&backend.anonymous_config()).unwrap());
    let (notifier, mut notices) = ChannelNotifier::channel();
    let store = CartStore::new(gateway, Arc::new(notifier), &SyncConfig::default());

    let result = store.refresh().await;

    assert_eq!(result, Err(SyncError::Gateway(GatewayError::Unauthorized)));
    assert!(store.view().items.is_empty());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = greenhouse_client::ApiConfig::new(&format!("http://{addr}")).unwrap();
    let gateway = HttpGateway::new(&config).unwrap();
    let result = gateway.fetch_cart().await;

    assert!(matches!(result, Err(GatewayError::Network(_))));
}
