//! Cart entries and the cart documents served by the backend.

use serde::{Deserialize, Serialize};

use super::id::{CartEntryId, ProductId};
use super::price::Price;
use super::quantity::Quantity;

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    #[serde(rename = "_id")]
    pub id: CartEntryId,
    #[serde(rename = "produitId")]
    pub product_id: ProductId,
    #[serde(rename = "nom")]
    pub name: String,
    /// Unit price.
    #[serde(rename = "prix")]
    pub unit_price: Price,
    #[serde(rename = "quantite")]
    pub quantity: Quantity,
    /// Image path or URL, if the product has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The full cart as returned by every cart endpoint.
///
/// `total` is computed server-side and is authoritative; it is never derived
/// from `items` on the client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSnapshotDocument {
    #[serde(default)]
    pub items: Vec<CartEntry>,
    #[serde(rename = "montantTotal", default)]
    pub total: Price,
}
