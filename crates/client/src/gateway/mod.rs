//! Remote collection gateways.
//!
//! # Architecture
//!
//! - The backend owns both collections; the client never edits a list locally
//! - Every mutation yields an authoritative snapshot, so the stores only ever
//!   replace their cache
//! - [`HttpGateway`] talks to the REST backend with `reqwest`; tests plug in
//!   scripted gateways instead
//!
//! The cart endpoints return the whole cart after a write. The notification
//! endpoints only return a status, so [`HttpGateway`] re-reads the loaded
//! window after each successful notification write.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpGateway;

use std::future::Future;

use greenhouse_core::{CartEntry, CartEntryId, Notification, NotificationId, Price, ProductId, Quantity};

use crate::cache::Snapshot;
use crate::error::GatewayError;

/// The whole cart with its server-computed total.
pub type CartSnapshot = Snapshot<CartEntry, Price>;

/// A window of the notification list with the collection-wide unread count.
pub type NotificationSnapshot = Snapshot<Notification, u64>;

/// Offset pagination over a server collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: u64,
    pub limit: u32,
}

impl PageRequest {
    /// The first `limit` entries.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { skip: 0, limit }
    }
}

/// Cart endpoints.
pub trait CartGateway: Send + Sync + 'static {
    /// Fetch the whole cart.
    fn fetch_cart(&self) -> impl Future<Output = Result<CartSnapshot, GatewayError>> + Send;

    /// Add `quantity` units of a product.
    fn add_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartSnapshot, GatewayError>> + Send;

    /// Set the quantity of one entry.
    fn update_quantity(
        &self,
        entry_id: &CartEntryId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartSnapshot, GatewayError>> + Send;

    /// Remove one entry.
    fn remove_item(
        &self,
        entry_id: &CartEntryId,
    ) -> impl Future<Output = Result<CartSnapshot, GatewayError>> + Send;

    /// Empty the cart.
    fn clear(&self) -> impl Future<Output = Result<CartSnapshot, GatewayError>> + Send;
}

/// Notification endpoints.
///
/// Write methods receive the window the caller currently holds and return a
/// fresh snapshot of that window.
pub trait NotificationGateway: Send + Sync + 'static {
    /// Fetch one page.
    fn fetch_page(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<NotificationSnapshot, GatewayError>> + Send;

    /// Fetch only the unread count.
    fn fetch_unread_count(&self) -> impl Future<Output = Result<u64, GatewayError>> + Send;

    fn mark_as_read(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> impl Future<Output = Result<NotificationSnapshot, GatewayError>> + Send;

    fn mark_all_as_read(
        &self,
        window: PageRequest,
    ) -> impl Future<Output = Result<NotificationSnapshot, GatewayError>> + Send;

    fn delete(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> impl Future<Output = Result<NotificationSnapshot, GatewayError>> + Send;

    /// Delete every notification already read.
    fn delete_all_read(
        &self,
        window: PageRequest,
    ) -> impl Future<Output = Result<NotificationSnapshot, GatewayError>> + Send;
}
