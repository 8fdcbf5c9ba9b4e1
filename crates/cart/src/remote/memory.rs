//! In-process remote cart for tests.
//!
//! Behaves like the storefront cart API: one cart per credential holder,
//! lines built from its own catalog, a full cart returned after every
//! mutation. Failures and stalls can be injected per call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use tidewear_core::{CartLine, CartLineId, Credential, Product, ProductId, Size};

use super::{AddItem, RemoteCartGateway, RemoteError};

/// A call the gateway received, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `fetch`.
    Fetch,
    /// `add_item` with product, size and quantity to add.
    Add(ProductId, Size, u32),
    /// `update_item` with product, size and the new quantity.
    Update(ProductId, Size, u32),
    /// `remove_item` for a product and size.
    Remove(ProductId, Size),
    /// `clear`.
    Clear,
}

/// Server cart held in memory, keyed by credential token.
#[derive(Debug)]
pub struct MemoryCartGateway {
    catalog: HashMap<ProductId, Product>,
    carts: Mutex<HashMap<String, Vec<CartLine>>>,
    calls: Mutex<Vec<GatewayCall>>,
    revoked: Mutex<HashSet<String>>,
    next_line_id: AtomicI32,
    failing: AtomicBool,
    paused: watch::Sender<bool>,
}

impl MemoryCartGateway {
    /// Create a gateway selling `catalog`.
    #[must_use]
    pub fn new(catalog: impl IntoIterator<Item = Product>) -> Self {
        Self {
            catalog: catalog.into_iter().map(|p| (p.id, p)).collect(),
            carts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            revoked: Mutex::new(HashSet::new()),
            next_line_id: AtomicI32::new(1),
            failing: AtomicBool::new(false),
            paused: watch::Sender::new(false),
        }
    }

    /// Seed the server cart for `credential` with `lines`.
    pub async fn seed(&self, credential: &Credential, lines: Vec<CartLine>) {
        let lines = lines
            .into_iter()
            .map(|line| CartLine {
                line_id: Some(self.allocate_line_id()),
                ..line
            })
            .collect();
        self.carts
            .lock()
            .await
            .insert(credential.expose().to_string(), lines);
    }

    /// Server cart for `credential` (empty if never touched).
    pub async fn cart(&self, credential: &Credential) -> Vec<CartLine> {
        self.carts
            .lock()
            .await
            .get(credential.expose())
            .cloned()
            .unwrap_or_default()
    }

    /// Answer every call made with `credential` as unauthorized.
    pub async fn revoke(&self, credential: &Credential) {
        self.revoked
            .lock()
            .await
            .insert(credential.expose().to_string());
    }

    /// Make every subsequent call fail like a dropped connection.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every subsequent call until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release held calls.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    fn allocate_line_id(&self) -> CartLineId {
        CartLineId::new(self.next_line_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record the call, wait out a pause, then apply the failure switch and
    /// revocations.
    async fn enter(&self, credential: &Credential, call: GatewayCall) -> Result<(), RemoteError> {
        self.calls.lock().await.push(call);

        let mut paused = self.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = paused.wait_for(|held| !*held).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("connection reset".to_string()));
        }
        if self.revoked.lock().await.contains(credential.expose()) {
            return Err(RemoteError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartGateway for MemoryCartGateway {
    async fn fetch(&self, credential: &Credential) -> Result<Vec<CartLine>, RemoteError> {
        self.enter(credential, GatewayCall::Fetch).await?;
        Ok(self.cart(credential).await)
    }

    async fn add_item(
        &self,
        credential: &Credential,
        item: &AddItem,
    ) -> Result<Vec<CartLine>, RemoteError> {
        self.enter(credential, GatewayCall::Add(
            item.product_id,
            item.size.clone(),
            item.quantity,
        ))
        .await?;

        let product = self
            .catalog
            .get(&item.product_id)
            .ok_or_else(|| RemoteError::NotFound("Product not found".to_string()))?;
        if product.stock < item.quantity {
            return Err(RemoteError::Rejected("Not enough stock".to_string()));
        }

        let mut carts = self.carts.lock().await;
        let lines = carts.entry(credential.expose().to_string()).or_default();
        if let Some(line) = lines
            .iter_mut()
            .find(|line| line.is(item.product_id, &item.size))
        {
            line.quantity = line.quantity.saturating_add(item.quantity);
        } else {
            lines.push(CartLine {
                line_id: Some(self.allocate_line_id()),
                ..CartLine::from_product(product, item.size.clone(), item.quantity)
            });
        }
        Ok(lines.clone())
    }

    async fn update_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<Vec<CartLine>, RemoteError> {
        self.enter(credential, GatewayCall::Update(product_id, size.clone(), quantity))
            .await?;

        let mut carts = self.carts.lock().await;
        let lines = carts
            .get_mut(credential.expose())
            .ok_or_else(|| RemoteError::NotFound("Cart or item not found".to_string()))?;
        if quantity == 0 {
            lines.retain(|line| !line.is(product_id, size));
            return Ok(lines.clone());
        }
        let line = lines
            .iter_mut()
            .find(|line| line.is(product_id, size))
            .ok_or_else(|| RemoteError::NotFound("Cart or item not found".to_string()))?;
        line.quantity = quantity;
        Ok(lines.clone())
    }

    async fn remove_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
    ) -> Result<Vec<CartLine>, RemoteError> {
        self.enter(credential, GatewayCall::Remove(product_id, size.clone()))
            .await?;

        let mut carts = self.carts.lock().await;
        let lines = carts.entry(credential.expose().to_string()).or_default();
        lines.retain(|line| !line.is(product_id, size));
        Ok(lines.clone())
    }

    async fn clear(&self, credential: &Credential) -> Result<(), RemoteError> {
        self.enter(credential, GatewayCall::Clear).await?;
        self.carts
            .lock()
            .await
            .insert(credential.expose().to_string(), Vec::new());
        Ok(())
    }
}
