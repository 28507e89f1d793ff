//! Consumer lifecycle over the HTTP gateway.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use greenhouse_client::{
    ClientConfig, GatewayError, HttpGateway, SyncConfig, SyncContext, SyncError, TracingNotifier,
};
use greenhouse_core::{ProductId, Quantity};
use greenhouse_integration_tests::FakeBackend;

fn context(backend: &FakeBackend, poll_interval: Duration) -> SyncContext<HttpGateway, HttpGateway> {
    let config = ClientConfig {
        api: backend.api_config(),
        sync: SyncConfig {
            poll_interval,
            ..SyncConfig::default()
        },
    };
    SyncContext::from_config(&config, Arc::new(TracingNotifier)).unwrap()
}

#[tokio::test]
async fn test_attach_loads_cart_and_notifications() {
    let backend = FakeBackend::start().await;
    backend.add_product("basil", "Graines de basilic", 1000, 10);
    backend.seed_notifications(3, 2);
    let context = context(&backend, Duration::from_secs(30));

    let consumer = context.attach().await;

    assert!(consumer.cart().view().items.is_empty());
    assert_eq!(consumer.notifications().view().items.len(), 3);
    assert_eq!(consumer.notifications().unread_count(), 2);
    assert_eq!(backend.request_count("GET /api/cart"), 1);
    assert_eq!(backend.request_count("GET /api/notifications?"), 1);
}

#[tokio::test]
async fn test_consumers_share_one_cart() {
    let backend = FakeBackend::start().await;
    backend.add_product("basil", "Graines de basilic", 1000, 10);
    let context = context(&backend, Duration::from_secs(30));

    let header = context.attach().await;
    let page = context.attach().await;
    page.cart()
        .add_item(ProductId::new("basil"), Quantity::new(2).unwrap())
        .await
        .unwrap();

    assert_eq!(header.cart().view().item_count, 2);
    assert_eq!(backend.request_count("GET /api/cart"), 1);
}

#[tokio::test]
async fn test_detach_stops_polling_and_writes() {
    let backend = FakeBackend::start().await;
    backend.seed_notifications(1, 1);
    let context = context(&backend, Duration::from_millis(30));

    let consumer = context.attach().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let cart = consumer.cart().view();
    drop(consumer);
    assert_eq!(context.consumer_count(), 0);

    // Let any in-flight poll finish before counting
    tokio::time::sleep(Duration::from_millis(50)).await;
    let polls = backend.request_count("GET /api/notifications/unread-count");
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(polls >= 1);
    assert_eq!(
        backend.request_count("GET /api/notifications/unread-count"),
        polls
    );
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn test_anonymous_attach_stays_empty() {
    let backend = FakeBackend::start().await;
    backend.seed_notifications(2, 2);
    let config = ClientConfig {
        api: backend.anonymous_config(),
        sync: SyncConfig::default(),
    };
    let context = SyncContext::from_config(&config, Arc::new(TracingNotifier)).unwrap();

    let consumer = context.attach().await;

    assert!(consumer.cart().view().items.is_empty());
    assert!(consumer.notifications().view().items.is_empty());
    assert_eq!(
        consumer.notifications().refresh().await,
        Err(SyncError::Gateway(GatewayError::Unauthorized))
    );
}
