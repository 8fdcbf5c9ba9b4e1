//! Cart error types with Sentry integration.
//!
//! Every fallible engine operation returns [`CartError`], which is one of
//! three kinds:
//!
//! - [`ValidationError`] - rejected before anything changed
//! - [`SyncFailure`] - an optimistic change was applied, the authoritative
//!   write failed, and the change was rolled back
//! - [`LoadFailure`] - a transition could not fetch the remote cart, the
//!   previous state was kept
//!
//! None of them is fatal; retrying the triggering action is always safe.

use std::time::Duration;

use thiserror::Error;
use tidewear_core::{LineKey, ProductId, Size};

use crate::persistence::PersistenceError;
use crate::remote::RemoteError;
use crate::stock::StockShortfall;

/// A mutation was rejected before anything changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Requested quantity would exceed available stock.
    #[error("not enough stock for {key}: {shortfall}")]
    OutOfStock {
        /// Line the request targeted.
        key: LineKey,
        /// Stock check details.
        shortfall: StockShortfall,
    },

    /// `add` was called with a zero quantity.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// The product is not sold in the requested size.
    #[error("size {size} is not offered for product {product_id}")]
    SizeNotOffered {
        /// Product ID.
        product_id: ProductId,
        /// Requested size.
        size: Size,
    },

    /// `update` targeted a line that is not in the cart.
    #[error("no cart line for {0}")]
    UnknownLine(LineKey),
}

/// The authoritative write behind an optimistic change failed.
#[derive(Debug, Error)]
pub enum SyncFailure {
    /// The remote cart service rejected or failed the call.
    #[error("remote cart update failed: {0}")]
    Remote(#[from] RemoteError),

    /// The guest snapshot could not be written.
    #[error("guest cart could not be saved: {0}")]
    Persistence(#[from] PersistenceError),

    /// The remote cart service did not answer in time.
    #[error("remote cart did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A transition could not load the authoritative cart.
#[derive(Debug, Error)]
pub enum LoadFailure {
    /// The remote cart fetch failed.
    #[error("remote cart fetch failed: {0}")]
    Remote(#[from] RemoteError),

    /// The remote cart service did not answer in time.
    #[error("remote cart fetch did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Error returned by cart engine operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Rejected before any change.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Rolled back after a failed write.
    #[error("Sync failure: {0}")]
    Sync(#[from] SyncFailure),

    /// Transition fetch failed.
    #[error("Load failure: {0}")]
    Load(#[from] LoadFailure),
}

impl CartError {
    /// Log the error and capture I/O failures to Sentry.
    ///
    /// Validation errors are user mistakes and only logged at debug.
    pub fn report(&self) {
        match self {
            Self::Validation(err) => {
                tracing::debug!(error = %err, "Cart request rejected");
            }
            Self::Sync(_) | Self::Load(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart synchronization error"
                );
            }
        }
    }

    /// Message safe to show the shopper.
    ///
    /// Validation errors describe the problem; I/O failures don't expose
    /// internal details.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::OutOfStock { shortfall, .. }) => {
                format!(
                    "Sorry, only {} items available in stock.",
                    shortfall.available
                )
            }
            Self::Validation(err) => err.to_string(),
            Self::Sync(_) => "Failed to update your cart. Please try again.".to_string(),
            Self::Load(_) => "Failed to load your cart. Please try again.".to_string(),
        }
    }

    /// Whether the remote service rejected the credential, meaning the
    /// identity provider should treat it as invalidated.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Sync(SyncFailure::Remote(RemoteError::Unauthorized))
                | Self::Load(LoadFailure::Remote(RemoteError::Unauthorized))
        )
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to a sync failure.
pub fn add_breadcrumb(message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("cart".to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String(value.clone()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stock::{self, StockDecision};

    fn out_of_stock() -> ValidationError {
        let StockDecision::Reject(shortfall) = stock::check(4, 2, 5) else {
            panic!("expected rejection");
        };
        ValidationError::OutOfStock {
            key: LineKey::new(ProductId::new(1), Size::parse("M").unwrap()),
            shortfall,
        }
    }

    #[test]
    fn test_cart_error_display() {
        let err = CartError::from(out_of_stock());
        assert_eq!(
            err.to_string(),
            "Validation error: not enough stock for 1/M: only 5 available, 2 already in cart, 4 requested"
        );

        let err = CartError::from(SyncFailure::Timeout(Duration::from_secs(10)));
        assert_eq!(
            err.to_string(),
            "Sync failure: remote cart did not respond within 10s"
        );
    }

    #[test]
    fn test_user_message_hides_internals() {
        assert_eq!(
            CartError::from(out_of_stock()).user_message(),
            "Sorry, only 5 items available in stock."
        );
        assert_eq!(
            CartError::from(SyncFailure::Timeout(Duration::from_secs(10))).user_message(),
            "Failed to update your cart. Please try again."
        );
        assert_eq!(
            CartError::from(LoadFailure::Timeout(Duration::from_secs(1))).user_message(),
            "Failed to load your cart. Please try again."
        );
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(CartError::from(SyncFailure::Remote(RemoteError::Unauthorized)).is_unauthorized());
        assert!(CartError::from(LoadFailure::Remote(RemoteError::Unauthorized)).is_unauthorized());
        assert!(!CartError::from(SyncFailure::Timeout(Duration::from_secs(1))).is_unauthorized());
    }

    #[test]
    fn test_report_without_sentry_client_is_noop() {
        CartError::from(SyncFailure::Remote(RemoteError::Unauthorized)).report();
        CartError::from(LoadFailure::Timeout(Duration::from_secs(1))).report();
        add_breadcrumb("add", &[("product_id", "1".to_string())]);
    }
}
