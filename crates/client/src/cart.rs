//! Cart store.
//!
//! Keeps the user's cart in a [`CollectionCache`]. Every cart endpoint returns
//! the whole updated cart, so each operation simply installs that snapshot.
//! The total shown to the user is always the server's `montantTotal`.

use std::sync::Arc;

use greenhouse_core::{CartEntry, CartEntryId, Price, ProductId, Quantity};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::cache::{CacheState, CollectionCache, ReplaceMode};
use crate::config::SyncConfig;
use crate::coordinator::MutationCoordinator;
use crate::error::Result;
use crate::gateway::CartGateway;
use crate::notice::Notifier;

const COLLECTION: &str = "cart";

/// Raw cache state of the cart.
pub type CartState = CacheState<CartEntry, Price>;

/// Read-only view of the cart for presentation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartEntry>,
    /// Server-computed total.
    pub total: Price,
    /// Sum of entry quantities, for badge display.
    pub item_count: u64,
    pub is_loading: bool,
}

impl From<CartState> for CartView {
    fn from(state: CartState) -> Self {
        let item_count = state
            .snapshot
            .items
            .iter()
            .map(|entry| u64::from(entry.quantity.get()))
            .sum();
        Self {
            item_count,
            items: state.snapshot.items,
            total: state.snapshot.aggregate,
            is_loading: state.is_loading,
        }
    }
}

/// Synchronized cart.
pub struct CartStore<G> {
    gateway: Arc<G>,
    coordinator: MutationCoordinator<CartEntry, Price>,
}

impl<G> std::fmt::Debug for CartStore<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl<G: CartGateway> CartStore<G> {
    /// Create an empty store. Call [`refresh`](Self::refresh) to load it.
    #[must_use]
    pub fn new(gateway: Arc<G>, notifier: Arc<dyn Notifier>, config: &SyncConfig) -> Self {
        Self {
            gateway,
            coordinator: MutationCoordinator::new(
                COLLECTION,
                Arc::new(CollectionCache::new()),
                notifier,
                config.serialize_mutations,
            ),
        }
    }

    fn cache(&self) -> &CollectionCache<CartEntry, Price> {
        self.coordinator.cache()
    }

    /// Current cart.
    #[must_use]
    pub fn view(&self) -> CartView {
        self.cache().view().into()
    }

    /// Server-computed total.
    #[must_use]
    pub fn total(&self) -> Price {
        self.cache().with_snapshot(|snapshot| snapshot.aggregate)
    }

    /// Whether an operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cache().is_loading()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.cache().subscribe()
    }

    /// Reload the whole cart.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous cart is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        self.coordinator
            .run("refresh", ReplaceMode::Overwrite, || self.gateway.fetch_cart())
            .await
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous cart is kept.
    #[instrument(skip_all, fields(product_id = %product_id, quantity = %quantity))]
    pub async fn add_item(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        self.coordinator
            .run("add_item", ReplaceMode::Overwrite, || {
                self.gateway.add_item(&product_id, quantity)
            })
            .await
    }

    /// Change the quantity of one entry.
    ///
    /// A quantity below 1 is ignored without contacting the server; use
    /// [`remove_item`](Self::remove_item) to delete an entry.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous cart is kept.
    #[instrument(skip_all, fields(entry_id = %entry_id))]
    pub async fn update_quantity(&self, entry_id: CartEntryId, quantity: i64) -> Result<()> {
        let Ok(quantity) = Quantity::new(quantity) else {
            debug!(quantity, "Ignoring quantity below 1");
            return Ok(());
        };

        self.coordinator
            .run("update_quantity", ReplaceMode::Overwrite, || {
                self.gateway.update_quantity(&entry_id, quantity)
            })
            .await
    }

    /// Remove one entry.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous cart is kept.
    #[instrument(skip_all, fields(entry_id = %entry_id))]
    pub async fn remove_item(&self, entry_id: CartEntryId) -> Result<()> {
        self.coordinator
            .run("remove_item", ReplaceMode::Overwrite, || {
                self.gateway.remove_item(&entry_id)
            })
            .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure; the previous cart is kept.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.coordinator
            .run("clear", ReplaceMode::Overwrite, || self.gateway.clear())
            .await
    }

    /// Stop applying responses. In-flight calls finish but are ignored.
    pub fn teardown(&self) {
        self.cache().deactivate();
    }
}
