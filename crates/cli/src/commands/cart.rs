//! Cart commands.

use greenhouse_client::CartView;
use greenhouse_core::{CartEntryId, ProductId, Quantity};

use super::{CommandError, Session};

/// Print the cart.
pub async fn show(session: &Session) -> Result<(), CommandError> {
    let store = session.cart().await?;
    print_cart(&store.view());
    Ok(())
}

/// Add `quantity` units of `product_id`.
pub async fn add(session: &Session, product_id: String, quantity: i64) -> Result<(), CommandError> {
    let quantity = Quantity::new(quantity)?;
    let store = session.cart().await?;

    store.add_item(ProductId::new(product_id), quantity).await?;

    print_cart(&store.view());
    Ok(())
}

/// Set the quantity of `entry_id`. Quantities below 1 leave the cart as is.
pub async fn set_quantity(
    session: &Session,
    entry_id: String,
    quantity: i64,
) -> Result<(), CommandError> {
    let store = session.cart().await?;

    if quantity < 1 {
        tracing::warn!("Quantity must be at least 1; use `cart remove` to delete an entry");
    }
    store
        .update_quantity(CartEntryId::new(entry_id), quantity)
        .await?;

    print_cart(&store.view());
    Ok(())
}

/// Remove `entry_id`.
pub async fn remove(session: &Session, entry_id: String) -> Result<(), CommandError> {
    let store = session.cart().await?;
    store.remove_item(CartEntryId::new(entry_id)).await?;
    print_cart(&store.view());
    Ok(())
}

/// Empty the cart.
pub async fn clear(session: &Session) -> Result<(), CommandError> {
    let store = session.cart().await?;
    store.clear().await?;
    tracing::info!("Cart emptied");
    Ok(())
}

fn print_cart(view: &CartView) {
    if view.items.is_empty() {
        tracing::info!("Cart is empty");
        return;
    }

    for entry in &view.items {
        tracing::info!(
            "{}  {} x{} @ {}",
            entry.id,
            entry.name,
            entry.quantity,
            entry.unit_price
        );
    }
    tracing::info!("{} item(s), total {}", view.item_count, view.total);
}
