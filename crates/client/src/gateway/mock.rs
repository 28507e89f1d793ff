//! Scripted gateways for unit tests.
//!
//! Each call pops the next scripted reply. Replies can be immediate or
//! deferred behind a oneshot channel so tests control completion order.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use greenhouse_core::{
    CartEntry, CartEntryId, Notification, NotificationCategory, NotificationId, Price, Priority,
    ProductId, Quantity, UserId,
};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

use super::{CartGateway, CartSnapshot, NotificationGateway, NotificationSnapshot, PageRequest};
use crate::cache::Snapshot;
use crate::error::GatewayError;

type Reply<T> = Result<T, GatewayError>;

enum Scripted<T> {
    Now(Reply<T>),
    Later(oneshot::Receiver<Reply<T>>),
}

/// FIFO of replies for one kind of call.
pub struct Script<T> {
    replies: Mutex<VecDeque<Scripted<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Script<T> {
    pub fn push_ok(&self, value: T) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Scripted::Now(Ok(value)));
    }

    pub fn push_err(&self, err: GatewayError) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Scripted::Now(Err(err)));
    }

    /// Queue a reply that resolves when the returned sender fires.
    pub fn push_deferred(&self) -> oneshot::Sender<Reply<T>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Scripted::Later(rx));
        tx
    }

    async fn next(&self) -> Reply<T> {
        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(Scripted::Now(reply)) => reply,
            Some(Scripted::Later(rx)) => rx.await.unwrap_or_else(|_| {
                Err(GatewayError::Network("deferred reply dropped".to_string()))
            }),
            None => Err(GatewayError::Server {
                status: 500,
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

/// Call log shared by the mocks.
#[derive(Default)]
pub struct Calls(Mutex<Vec<String>>);

impl Calls {
    fn record(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Default)]
pub struct MockCartGateway {
    pub replies: Script<CartSnapshot>,
    pub calls: Calls,
}

impl CartGateway for MockCartGateway {
    async fn fetch_cart(&self) -> Result<CartSnapshot, GatewayError> {
        self.calls.record("fetch_cart".to_string());
        self.replies.next().await
    }

    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        self.calls.record(format!("add_item {product_id} {quantity}"));
        self.replies.next().await
    }

    async fn update_quantity(
        &self,
        entry_id: &CartEntryId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        self.calls
            .record(format!("update_quantity {entry_id} {quantity}"));
        self.replies.next().await
    }

    async fn remove_item(&self, entry_id: &CartEntryId) -> Result<CartSnapshot, GatewayError> {
        self.calls.record(format!("remove_item {entry_id}"));
        self.replies.next().await
    }

    async fn clear(&self) -> Result<CartSnapshot, GatewayError> {
        self.calls.record("clear".to_string());
        self.replies.next().await
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Default)]
pub struct MockNotificationGateway {
    pub pages: Script<NotificationSnapshot>,
    pub counts: Script<u64>,
    pub calls: Calls,
}

impl NotificationGateway for MockNotificationGateway {
    async fn fetch_page(&self, page: PageRequest) -> Result<NotificationSnapshot, GatewayError> {
        self.calls
            .record(format!("fetch_page {} {}", page.skip, page.limit));
        self.pages.next().await
    }

    async fn fetch_unread_count(&self) -> Result<u64, GatewayError> {
        self.calls.record("fetch_unread_count".to_string());
        self.counts.next().await
    }

    async fn mark_as_read(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        self.calls
            .record(format!("mark_as_read {id} {}", window.limit));
        self.pages.next().await
    }

    async fn mark_all_as_read(
        &self,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        self.calls
            .record(format!("mark_all_as_read {}", window.limit));
        self.pages.next().await
    }

    async fn delete(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        self.calls.record(format!("delete {id} {}", window.limit));
        self.pages.next().await
    }

    async fn delete_all_read(
        &self,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        self.calls
            .record(format!("delete_all_read {}", window.limit));
        self.pages.next().await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn euros(amount: i64) -> Price {
    Price::new(Decimal::new(amount, 0)).unwrap()
}

pub fn cart_entry(id: &str, quantity: i64, unit_price: i64) -> CartEntry {
    CartEntry {
        id: CartEntryId::new(id),
        product_id: ProductId::new(format!("product-{id}")),
        name: format!("Item {id}"),
        unit_price: euros(unit_price),
        quantity: Quantity::new(quantity).unwrap(),
        image: None,
    }
}

pub fn cart(entries: Vec<CartEntry>, total: i64) -> CartSnapshot {
    Snapshot::complete(entries, euros(total))
}

pub fn notification(id: &str, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::new(id),
        user_id: UserId::new("u1"),
        category: NotificationCategory::Alert,
        title: format!("Notification {id}"),
        body: "Humidité basse".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        is_read,
        link: None,
        priority: Priority::Normal,
    }
}

pub fn notification_page(
    items: Vec<Notification>,
    unread: u64,
    cursor: u64,
    has_more: bool,
) -> NotificationSnapshot {
    Snapshot {
        items,
        aggregate: unread,
        cursor,
        has_more,
    }
}
