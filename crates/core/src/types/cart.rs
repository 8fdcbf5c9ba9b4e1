//! Cart line and cart state types.
//!
//! # Invariants
//!
//! - No two lines in a [`CartState`] share a `(product_id, size)` pair
//! - Every line has `quantity >= 1`; a line that would reach zero is removed
//! - The total is always derived from the lines, never stored

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartLineId, ProductId};
use super::size::Size;
use super::status::CartMode;

/// A catalog product as supplied by the catalog service.
///
/// The cart only reads it: the price becomes the line's unit price snapshot,
/// the stock feeds the stock check, the rest is display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Current unit price.
    pub price: Decimal,
    /// Units available for sale.
    pub stock: u32,
    /// Image URLs, first is the featured image.
    #[serde(default)]
    pub images: Vec<String>,
    /// Offered sizes. Empty means the product is not sized.
    #[serde(default)]
    pub sizes: Vec<String>,
}

impl Product {
    /// Whether the product is offered in `size`.
    ///
    /// Products without a size list accept any size label.
    #[must_use]
    pub fn offers_size(&self, size: &Size) -> bool {
        self.sizes.is_empty() || self.sizes.iter().any(|s| s.trim() == size.as_str())
    }
}

/// Display-only product data carried on a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Product title.
    pub title: String,
    /// Featured image URL.
    pub image: Option<String>,
    /// Units available when the line was last refreshed.
    pub stock: u32,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            title: product.title.clone(),
            image: product.images.first().cloned(),
            stock: product.stock,
        }
    }
}

/// Identity of a cart line: one product in one size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product ID.
    pub product_id: ProductId,
    /// Size label.
    pub size: Size,
}

impl LineKey {
    /// Create a new line key.
    #[must_use]
    pub const fn new(product_id: ProductId, size: Size) -> Self {
        Self { product_id, size }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.size)
    }
}

/// One (product, size) selection in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product ID.
    pub product_id: ProductId,
    /// Size label.
    pub size: Size,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Unit price snapshot taken when the line was added.
    pub unit_price: Decimal,
    /// Display data.
    pub product: ProductSummary,
    /// Server cart line ID. `None` for guest lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<CartLineId>,
}

impl CartLine {
    /// Create a guest line for `product` in `size`.
    #[must_use]
    pub fn from_product(product: &Product, size: Size, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            size,
            quantity,
            unit_price: product.price,
            product: ProductSummary::from(product),
            line_id: None,
        }
    }

    /// Whether this line is the `(product_id, size)` pair.
    #[must_use]
    pub fn is(&self, product_id: ProductId, size: &Size) -> bool {
        self.product_id == product_id && &self.size == size
    }

    /// The line's key.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id, self.size.clone())
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The cart: mode plus ordered lines.
///
/// Line order is insertion order and is preserved by updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartState {
    /// Which source is authoritative.
    pub mode: CartMode,
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
}

impl CartState {
    /// Create a cart state.
    #[must_use]
    pub const fn new(mode: CartMode, lines: Vec<CartLine>) -> Self {
        Self { mode, lines }
    }

    /// Empty cart in `mode`.
    #[must_use]
    pub const fn empty(mode: CartMode) -> Self {
        Self::new(mode, Vec::new())
    }

    /// Sum of `unit_price × quantity` over the current lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities over the current lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for `(product_id, size)`.
    #[must_use]
    pub fn find(&self, product_id: ProductId, size: &Size) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.is(product_id, size))
    }

    /// Quantity already in the cart for `(product_id, size)`, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId, size: &Size) -> u32 {
        self.find(product_id, size).map_or(0, |line| line.quantity)
    }

    /// Whether `lines` satisfy the cart invariants: positive quantities and
    /// unique `(product_id, size)` pairs.
    #[must_use]
    pub fn lines_are_well_formed(lines: &[CartLine]) -> bool {
        let mut seen = HashSet::with_capacity(lines.len());
        lines
            .iter()
            .all(|line| line.quantity > 0 && seen.insert(line.key()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            title: format!("Shirt {id}"),
            price,
            stock: 10,
            images: vec!["https://cdn.example/shirt.jpg".to_string()],
            sizes: vec!["S".to_string(), "M".to_string()],
        }
    }

    fn size(s: &str) -> Size {
        Size::parse(s).unwrap()
    }

    #[test]
    fn test_total_is_derived_from_lines() {
        let mut state = CartState::empty(CartMode::Guest);
        assert_eq!(state.total(), Decimal::ZERO);

        state.lines.push(CartLine::from_product(
            &product(1, Decimal::new(1999, 2)),
            size("M"),
            2,
        ));
        state.lines.push(CartLine::from_product(
            &product(2, Decimal::new(5, 0)),
            size("S"),
            3,
        ));

        assert_eq!(state.total(), Decimal::new(5498, 2));
        assert_eq!(state.item_count(), 5);

        state.lines.remove(0);
        assert_eq!(state.total(), Decimal::new(15, 0));
    }

    #[test]
    fn test_from_product_snapshots_display_data() {
        let line = CartLine::from_product(&product(7, Decimal::new(12, 0)), size("M"), 1);
        assert_eq!(line.product.title, "Shirt 7");
        assert_eq!(
            line.product.image.as_deref(),
            Some("https://cdn.example/shirt.jpg")
        );
        assert_eq!(line.product.stock, 10);
        assert_eq!(line.unit_price, Decimal::new(12, 0));
        assert!(line.line_id.is_none());
    }

    #[test]
    fn test_find_and_quantity_of() {
        let mut state = CartState::empty(CartMode::Guest);
        state.lines.push(CartLine::from_product(
            &product(1, Decimal::ONE),
            size("M"),
            4,
        ));

        assert!(state.find(ProductId::new(1), &size("M")).is_some());
        assert!(state.find(ProductId::new(1), &size("S")).is_none());
        assert_eq!(state.quantity_of(ProductId::new(1), &size("M")), 4);
        assert_eq!(state.quantity_of(ProductId::new(2), &size("M")), 0);
    }

    #[test]
    fn test_offers_size() {
        let p = product(1, Decimal::ONE);
        assert!(p.offers_size(&size("M")));
        assert!(!p.offers_size(&size("XL")));

        let unsized_product = Product {
            sizes: Vec::new(),
            ..p
        };
        assert!(unsized_product.offers_size(&size("XL")));
    }

    #[test]
    fn test_lines_are_well_formed() {
        let p = product(1, Decimal::ONE);
        let m = CartLine::from_product(&p, size("M"), 1);
        let s = CartLine::from_product(&p, size("S"), 1);
        assert!(CartState::lines_are_well_formed(&[m.clone(), s]));
        assert!(!CartState::lines_are_well_formed(&[m.clone(), m.clone()]));

        let zero = CartLine { quantity: 0, ..m };
        assert!(!CartState::lines_are_well_formed(&[zero]));
    }

    #[test]
    fn test_guest_line_serializes_without_line_id() {
        let line = CartLine::from_product(&product(3, Decimal::new(250, 2)), size("S"), 1);
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("line_id").is_none());
        let back: CartLine = serde_json::from_value(json).unwrap();
        assert_eq!(back, line);
    }
}
