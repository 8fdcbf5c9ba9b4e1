//! Wire types for the storefront cart API and their conversions.
//!
//! The API returns the whole cart after every mutation:
//!
//! ```json
//! {
//!   "id": 3,
//!   "user_id": 12,
//!   "items": [
//!     { "id": 40, "product_id": 7, "quantity": 2, "size": "M",
//!       "product": { "id": 7, "title": "Linen Shirt", "description": "...",
//!                    "price": 49.5, "category": "shirts", "stock": 5,
//!                    "images": ["https://..."], "sizes": ["S", "M", "L"] } }
//!   ]
//! }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tidewear_core::{
    CartId, CartLine, CartLineId, Product, ProductId, ProductSummary, Size, UserId,
};

/// Cart record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCart {
    /// Cart ID.
    pub id: CartId,
    /// Owner.
    pub user_id: UserId,
    /// Items in server order.
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

/// Cart item as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCartItem {
    /// Cart line ID.
    pub id: CartLineId,
    /// Product ID.
    pub product_id: ProductId,
    /// Quantity.
    pub quantity: i64,
    /// Size label.
    pub size: String,
    /// Product details for display.
    pub product: WireProduct,
}

/// Product as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireProduct {
    /// Product ID.
    pub id: ProductId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Category slug.
    #[serde(default)]
    pub category: String,
    /// Units in stock.
    pub stock: i64,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Offered sizes.
    #[serde(default)]
    pub sizes: Vec<String>,
}

/// Body of `POST cart/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemBody {
    /// Product ID.
    pub product_id: ProductId,
    /// Quantity to add.
    pub quantity: u32,
    /// Size label.
    pub size: String,
}

/// Body of `PUT cart/items/{product_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemBody {
    /// New quantity.
    pub quantity: i64,
}

// =============================================================================
// Conversions
// =============================================================================

/// Clamp a signed stock count to `u32`. Negative stock reads as sold out.
fn clamp_stock(stock: i64) -> u32 {
    u32::try_from(stock.max(0)).unwrap_or(u32::MAX)
}

impl From<WireProduct> for Product {
    fn from(product: WireProduct) -> Self {
        Self {
            id: product.id,
            title: product.title,
            price: product.price,
            stock: clamp_stock(product.stock),
            images: product.images,
            sizes: product.sizes,
        }
    }
}

impl From<&WireProduct> for ProductSummary {
    fn from(product: &WireProduct) -> Self {
        Self {
            title: product.title.clone(),
            image: product.images.first().cloned(),
            stock: clamp_stock(product.stock),
        }
    }
}

/// Convert a server cart into engine lines, preserving server order.
///
/// Items the engine cannot represent are dropped with a warning: non-positive
/// quantities and invalid size labels. Items repeating an earlier
/// `(product_id, size)` pair are folded into the first occurrence.
#[must_use]
pub fn convert_cart(cart: WireCart) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = Vec::with_capacity(cart.items.len());

    for item in cart.items {
        let Ok(quantity) = u32::try_from(item.quantity) else {
            warn!(line_id = %item.id, quantity = item.quantity, "Dropping remote cart item with invalid quantity");
            continue;
        };
        if quantity == 0 {
            warn!(line_id = %item.id, "Dropping remote cart item with zero quantity");
            continue;
        }
        let size = match Size::parse(&item.size) {
            Ok(size) => size,
            Err(e) => {
                warn!(line_id = %item.id, error = %e, "Dropping remote cart item with invalid size");
                continue;
            }
        };

        if let Some(existing) = lines
            .iter_mut()
            .find(|line| line.is(item.product_id, &size))
        {
            warn!(line_id = %item.id, "Merging duplicate remote cart item");
            existing.quantity = existing.quantity.saturating_add(quantity);
            continue;
        }

        lines.push(CartLine {
            product_id: item.product_id,
            size,
            quantity,
            unit_price: item.product.price,
            product: ProductSummary::from(&item.product),
            line_id: Some(item.id),
        });
    }

    lines
}
