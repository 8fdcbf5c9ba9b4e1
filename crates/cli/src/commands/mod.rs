//! Cart commands.
//!
//! Each invocation opens one [`CartSession`]: the engine wired to the guest
//! cart file and the cart API, with the identity observed once up front. If
//! the token's cart cannot be loaded the session stays on the guest cart and
//! carries a notice saying so.

use std::fmt::Write as _;

use thiserror::Error;
use tidewear_cart::{
    CartConfig, CartError, HttpCartGateway, JsonFilePersistence, RemoteError, SyncEngine,
};
use tidewear_core::{CartMode, CartState, Credential, Price, ProductId, Size, SizeError};

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The size argument is not a valid size label.
    #[error("Invalid size: {0}")]
    InvalidSize(#[from] SizeError),

    /// The product could not be looked up in the catalog.
    #[error("Product lookup failed: {0}")]
    Catalog(#[from] RemoteError),

    /// The cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CommandError {
    /// Message to print for the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidSize(e) => format!("Invalid size: {e}"),
            Self::Catalog(RemoteError::NotFound(_)) => "That product does not exist.".to_string(),
            Self::Catalog(_) => "Failed to look up the product. Please try again.".to_string(),
            Self::Cart(e) => e.user_message(),
        }
    }
}

/// Engine plus catalog client for one command.
pub struct CartSession {
    engine: SyncEngine<JsonFilePersistence, HttpCartGateway>,
    catalog: HttpCartGateway,
    notice: Option<&'static str>,
}

impl CartSession {
    /// Build the engine from `config` and observe the configured identity.
    ///
    /// A failed account cart fetch is not fatal: the guest cart stays active
    /// and [`notice`](Self::notice) explains why.
    pub async fn open(config: &CartConfig) -> Self {
        let catalog = HttpCartGateway::new(config.api_url.clone());
        let engine = SyncEngine::new(
            JsonFilePersistence::new(&config.cart_path),
            catalog.clone(),
        )
        .with_remote_timeout(config.remote_timeout);

        let credential = config.token.clone().map(Credential::from);
        let notice = match engine.observe(credential).await {
            Ok(transition) => {
                tracing::debug!(?transition, "Cart session opened");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Account cart unavailable, using the guest cart");
                Some(guest_fallback_notice(&e))
            }
        };

        Self {
            engine,
            catalog,
            notice,
        }
    }

    /// Why the session is not on the cart the caller asked for, if it isn't.
    #[must_use]
    pub const fn notice(&self) -> Option<&'static str> {
        self.notice
    }

    /// Current cart.
    pub async fn show(&self) -> CartState {
        self.engine.snapshot().await
    }

    /// Look up `product` in the catalog and add `quantity` units in `size`.
    pub async fn add(&self, product: i32, size: &str, quantity: u32) -> Result<CartState, CommandError> {
        let size = Size::parse(size)?;
        let product = self.catalog.get_product(ProductId::new(product)).await?;
        tracing::info!(product = %product.title, %size, quantity, "Adding to cart");
        Ok(self.engine.add(&product, size, quantity).await?)
    }

    /// Set the quantity of a line; zero or less removes it.
    pub async fn update(&self, product: i32, size: &str, quantity: i64) -> Result<CartState, CommandError> {
        let size = Size::parse(size)?;
        Ok(self
            .engine
            .update(ProductId::new(product), size, quantity)
            .await?)
    }

    /// Remove the line for `product` in `size`.
    pub async fn remove(&self, product: i32, size: &str) -> Result<CartState, CommandError> {
        let size = Size::parse(size)?;
        Ok(self.engine.remove(ProductId::new(product), size).await?)
    }

    /// Empty the cart.
    pub async fn clear(&self) -> Result<CartState, CommandError> {
        Ok(self.engine.clear().await?)
    }

    /// Persist the guest cart before exit.
    pub async fn close(self) -> Result<(), CommandError> {
        Ok(self.engine.flush().await?)
    }
}

const fn guest_fallback_notice(err: &CartError) -> &'static str {
    if err.is_unauthorized() {
        "Your sign-in has expired. Showing the guest cart instead."
    } else {
        "Could not load your account cart. Showing the guest cart instead."
    }
}

/// Plain-text cart listing with a total line.
#[must_use]
pub fn render_cart(state: &CartState) -> String {
    let mut out = String::new();
    let label = match state.mode {
        CartMode::Guest => "guest cart",
        CartMode::Authenticated => "account cart",
    };

    if state.is_empty() {
        let _ = writeln!(out, "Your {label} is empty.");
        return out;
    }

    let _ = writeln!(out, "Your {label} ({} items):", state.item_count());
    for line in &state.lines {
        let _ = writeln!(
            out,
            "  #{:<5} {:<32} {:<6} x{:<3} {:>10}",
            line.product_id.to_string(),
            line.product.title,
            line.size.as_str(),
            line.quantity,
            Price::store(line.line_total()).to_string(),
        );
    }
    let _ = writeln!(out, "Total: {}", Price::store(state.total()));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use tidewear_core::{CartLine, Product};

    use super::*;

    fn tee() -> Product {
        Product {
            id: ProductId::new(12),
            title: "Harbor Tee".to_string(),
            price: Decimal::new(2450, 2),
            stock: 4,
            images: Vec::new(),
            sizes: Vec::new(),
        }
    }

    #[test]
    fn test_render_empty_cart() {
        let state = CartState::empty(CartMode::Guest);
        assert_eq!(render_cart(&state), "Your guest cart is empty.\n");
    }

    #[test]
    fn test_render_lines_and_total() {
        let line = CartLine::from_product(&tee(), Size::parse("M").unwrap(), 2);
        let state = CartState::new(CartMode::Authenticated, vec![line]);

        let out = render_cart(&state);

        assert!(out.starts_with("Your account cart (2 items):\n"));
        assert!(out.contains("Harbor Tee"));
        assert!(out.contains("$49.00"));
        assert!(out.ends_with("Total: $49.00\n"));
    }

    #[tokio::test]
    async fn test_open_falls_back_to_guest_when_account_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let api_url = format!("http://{}/api/", unused.local_addr().unwrap());
        drop(unused);
        let cart_path = dir.path().join("cart.json");
        let config = CartConfig::from_vars(|key| match key {
            "TIDEWEAR_API_URL" => Some(api_url.clone()),
            "TIDEWEAR_CART_PATH" => Some(cart_path.display().to_string()),
            "TIDEWEAR_REMOTE_TIMEOUT_SECS" => Some("2".to_string()),
            "TIDEWEAR_TOKEN" => Some("alice-token".to_string()),
            _ => None,
        })
        .unwrap();

        let session = CartSession::open(&config).await;

        assert_eq!(
            session.notice(),
            Some("Could not load your account cart. Showing the guest cart instead.")
        );
        let state = session.show().await;
        assert_eq!(state.mode, CartMode::Guest);
        assert!(state.is_empty());

        let state = session.clear().await.unwrap();
        assert_eq!(state.mode, CartMode::Guest);
        session.close().await.unwrap();
        assert!(cart_path.exists());
    }

    #[test]
    fn test_guest_fallback_notice() {
        let err = CartError::from(tidewear_cart::LoadFailure::Remote(RemoteError::Unauthorized));
        assert_eq!(
            guest_fallback_notice(&err),
            "Your sign-in has expired. Showing the guest cart instead."
        );
    }

    #[test]
    fn test_user_message() {
        let err = CommandError::from(RemoteError::NotFound("Product not found".to_string()));
        assert_eq!(err.user_message(), "That product does not exist.");

        let err = CommandError::from(Size::parse("").unwrap_err());
        assert!(err.user_message().starts_with("Invalid size"));
    }
}
