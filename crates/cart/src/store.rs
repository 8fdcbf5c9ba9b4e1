//! In-memory cart state holder.
//!
//! The store does no validation and no I/O. Only the engine mutates it; the
//! crate-private edit methods exist so the engine can apply optimistic
//! changes without rebuilding the whole line list.

use rust_decimal::Decimal;
use tidewear_core::{CartLine, CartMode, CartState, ProductId, Size};

/// Current cart state: mode and lines.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    state: CartState,
}

impl CartStore {
    /// Empty guest cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in `lines` and `mode` wholesale. No merge with the previous lines.
    pub fn replace(&mut self, lines: Vec<CartLine>, mode: CartMode) {
        self.state = CartState::new(mode, lines);
    }

    /// Copy of the current state, for reads and rollback.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.clone()
    }

    /// Sum of `unit_price × quantity`, recomputed on every call.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.state.total()
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> CartMode {
        self.state.mode
    }

    /// Current lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.state.lines
    }

    /// Borrow the current state.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    pub(crate) fn restore(&mut self, snapshot: CartState) {
        self.state = snapshot;
    }

    /// Increment the matching line in place, or append `line`.
    pub(crate) fn add_or_increment(&mut self, line: CartLine) {
        if let Some(existing) = self
            .state
            .lines
            .iter_mut()
            .find(|existing| existing.is(line.product_id, &line.size))
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            self.state.lines.push(line);
        }
    }

    /// Set a line's quantity without moving it. Returns whether it existed.
    ///
    /// A zero quantity removes the line.
    pub(crate) fn set_quantity(&mut self, product_id: ProductId, size: &Size, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id, size);
        }
        match self
            .state
            .lines
            .iter_mut()
            .find(|line| line.is(product_id, size))
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns whether it existed.
    pub(crate) fn remove(&mut self, product_id: ProductId, size: &Size) -> bool {
        let before = self.state.lines.len();
        self.state.lines.retain(|line| !line.is(product_id, size));
        self.state.lines.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.state.lines.clear();
    }
}
