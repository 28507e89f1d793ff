//! Core types for Greenhouse.
//!
//! This module provides type-safe wrappers for the synchronized collections.

pub mod cart;
pub mod id;
pub mod notification;
pub mod price;
pub mod quantity;

pub use cart::{CartEntry, CartSnapshotDocument};
pub use id::*;
pub use notification::{
    Notification, NotificationCategory, NotificationPageDocument, Priority, UnreadCountDocument,
};
pub use price::{Price, PriceError};
pub use quantity::{Quantity, QuantityError};
