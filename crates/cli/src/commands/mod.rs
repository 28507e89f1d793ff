//! Command implementations.
//!
//! One-shot commands build a single store, load it, run one operation and
//! print the resulting snapshot. `notifications watch` attaches to a
//! [`SyncContext`] so the unread-count poll runs.

pub mod cart;
pub mod notifications;

use std::sync::Arc;

use greenhouse_client::{
    CartStore, ClientConfig, ConfigError, GatewayError, HttpGateway, NotificationStore, Notifier,
    SyncContext, SyncError, TracingNotifier,
};
use greenhouse_core::QuantityError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A store operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Quantity argument out of range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Waiting for updates failed.
    #[error("Watch failed: {0}")]
    Watch(String),
}

/// Shared setup for every command.
pub struct Session {
    config: ClientConfig,
    gateway: Arc<HttpGateway>,
    notifier: Arc<dyn Notifier>,
}

impl Session {
    /// Load configuration and build the HTTP gateway.
    pub fn from_env() -> Result<Self, CommandError> {
        let config = ClientConfig::from_env()?;
        let gateway = Arc::new(HttpGateway::new(&config.api)?);
        tracing::debug!(api = %config.api.base_url, "Using backend");

        Ok(Self {
            config,
            gateway,
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// A cart store loaded from the backend.
    pub async fn cart(&self) -> Result<CartStore<HttpGateway>, CommandError> {
        let store = CartStore::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
            &self.config.sync,
        );
        store.refresh().await?;
        Ok(store)
    }

    /// A notification store with its first page loaded.
    pub async fn notifications(&self) -> Result<NotificationStore<HttpGateway>, CommandError> {
        let store = NotificationStore::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
            &self.config.sync,
        );
        store.refresh().await?;
        Ok(store)
    }

    /// A context sharing this session's gateway.
    pub fn context(&self) -> SyncContext<HttpGateway, HttpGateway> {
        SyncContext::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
            self.config.sync,
        )
    }
}
