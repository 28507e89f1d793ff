//! Greenhouse client - synchronized cart and notification caches.
//!
//! Each collection is a server-owned list mirrored in a [`CollectionCache`].
//! The cache is only ever replaced by snapshots the server returns; nothing is
//! edited locally. Stores wrap a cache with the operations a front-end needs
//! and report failures through a [`Notifier`].
//!
//! ```text
//! SyncContext ── attach ──> Consumer
//!    │                        ├─ CartStore ──────────┐
//!    │                        └─ NotificationStore ──┤ MutationCoordinator
//!    └─ PollLoop (unread count)                      └─> CollectionCache
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cart;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod notice;
pub mod notifications;
pub mod poll;

pub use cache::{CacheState, CollectionCache, ReplaceMode, Snapshot};
pub use cart::{CartState, CartStore, CartView};
pub use config::{ApiConfig, ClientConfig, ConfigError, SyncConfig};
pub use context::{Consumer, SyncContext};
pub use error::{GatewayError, Result, SyncError};
pub use gateway::{
    CartGateway, CartSnapshot, HttpGateway, NotificationGateway, NotificationSnapshot, PageRequest,
};
pub use notice::{ChannelNotifier, Notice, Notifier, TracingNotifier};
pub use notifications::{NotificationStore, NotificationsState, NotificationsView};
pub use poll::PollLoop;
