//! Remote cart service.
//!
//! # Architecture
//!
//! - [`RemoteCartGateway`] is the seam the engine talks to while a
//!   credential is held. Every call returns the full authoritative cart (or,
//!   for `clear`, a bare confirmation) so the engine can replace its state
//!   instead of patching it.
//! - [`HttpCartGateway`] binds the gateway to the storefront REST API with
//!   `reqwest`.
//! - [`MemoryCartGateway`] is an in-process server cart for tests, with
//!   failure injection and a pause gate.
//!
//! # Example
//!
//! ```rust,ignore
//! use tidewear_cart::remote::{HttpCartGateway, RemoteCartGateway};
//!
//! let gateway = HttpCartGateway::new(config.api_url.clone());
//! let lines = gateway.fetch(&credential).await?;
//! let lines = gateway.add_item(&credential, &AddItem { product_id, size, quantity: 1 }).await?;
//! ```

mod http;
mod memory;
pub mod types;

pub use http::HttpCartGateway;
pub use memory::{GatewayCall, MemoryCartGateway};

use async_trait::async_trait;
use thiserror::Error;
use tidewear_core::{CartLine, Credential, ProductId, Size};

/// Errors that can occur when calling the remote cart service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint URL could not be built.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// The credential was rejected.
    #[error("credential rejected")]
    Unauthorized,

    /// Cart, item, or product not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was rejected as invalid (e.g. not enough stock).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Service unreachable (used by in-process gateways).
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// An `add` request for the remote cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItem {
    /// Product ID.
    pub product_id: ProductId,
    /// Size label.
    pub size: Size,
    /// Quantity to add on top of what is already in the cart.
    pub quantity: u32,
}

/// Remote cart operations, each authorized by the shopper's credential.
///
/// Returned line lists are in the server's order and already satisfy the cart
/// invariants (unique pairs, positive quantities).
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// Fetch the authoritative cart.
    async fn fetch(&self, credential: &Credential) -> Result<Vec<CartLine>, RemoteError>;

    /// Add `item.quantity` units, incrementing an existing line in place.
    async fn add_item(
        &self,
        credential: &Credential,
        item: &AddItem,
    ) -> Result<Vec<CartLine>, RemoteError>;

    /// Set the quantity of an existing line.
    async fn update_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<Vec<CartLine>, RemoteError>;

    /// Remove a line.
    async fn remove_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
    ) -> Result<Vec<CartLine>, RemoteError>;

    /// Empty the cart.
    async fn clear(&self, credential: &Credential) -> Result<(), RemoteError>;
}
