//! Stock limit check.
//!
//! Consulted before anything that raises a line's quantity. Decrements and
//! removals never need it.

/// Outcome of a stock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecision {
    /// The requested quantity fits.
    Accept,
    /// The requested quantity would exceed available stock.
    Reject(StockShortfall),
}

/// Why a stock check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockShortfall {
    /// Quantity the caller asked to add.
    pub requested: u32,
    /// Quantity already in the cart for the same product and size.
    pub in_cart: u32,
    /// Units available for sale.
    pub available: u32,
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "only {} available, {} already in cart, {} requested",
            self.available, self.in_cart, self.requested
        )
    }
}

/// Check whether `requested` more units fit on top of `in_cart`.
///
/// Rejects when `in_cart + requested > available`.
#[must_use]
pub fn check(requested: u32, in_cart: u32, available: u32) -> StockDecision {
    if u64::from(in_cart) + u64::from(requested) > u64::from(available) {
        StockDecision::Reject(StockShortfall {
            requested,
            in_cart,
            available,
        })
    } else {
        StockDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_within_stock() {
        assert_eq!(check(1, 0, 1), StockDecision::Accept);
        assert_eq!(check(2, 2, 5), StockDecision::Accept);
        assert_eq!(check(0, 5, 5), StockDecision::Accept);
    }

    #[test]
    fn test_rejects_over_stock() {
        assert_eq!(
            check(4, 2, 5),
            StockDecision::Reject(StockShortfall {
                requested: 4,
                in_cart: 2,
                available: 5,
            })
        );
        assert!(matches!(check(1, 0, 0), StockDecision::Reject(_)));
    }

    #[test]
    fn test_does_not_overflow() {
        assert!(matches!(
            check(u32::MAX, u32::MAX, u32::MAX),
            StockDecision::Reject(_)
        ));
    }

    #[test]
    fn test_shortfall_message() {
        let StockDecision::Reject(shortfall) = check(4, 2, 5) else {
            panic!("expected rejection");
        };
        assert_eq!(
            shortfall.to_string(),
            "only 5 available, 2 already in cart, 4 requested"
        );
    }
}
