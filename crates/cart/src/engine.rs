//! Cart synchronization engine.
//!
//! # State machine
//!
//! | From | Signal | Effect |
//! |---|---|---|
//! | (start) | no credential | load guest snapshot |
//! | Guest | credential | fetch remote cart, replace wholesale (guest lines are not merged) |
//! | Authenticated | other credential | fetch with the new credential, replace |
//! | Authenticated | no credential | load guest snapshot, replace |
//! | any | same as last observed | nothing |
//!
//! A failed fetch leaves mode, credential and lines as they were, and the
//! observation is not recorded, so the next emission of the same credential
//! retries.
//!
//! # Mutations
//!
//! `add`, `update`, `remove` and `clear` all run the same protocol:
//! validate, snapshot, apply optimistically, dispatch to the authoritative
//! source, then reconcile (remote: replace with the returned cart) or roll
//! back to the snapshot.
//!
//! # Concurrency
//!
//! Mutations and transitions queue on one FIFO lock, so two
//! optimistic-then-reconcile cycles never interleave. Reads only take the
//! store's read lock and see optimistic state while a dispatch is pending.
//!
//! An identity signal that arrives while a remote dispatch is pending queues
//! behind it. The dispatch reconciles with the cart of the credential it was
//! sent with, then the transition runs: if it switches source it replaces the
//! store wholesale, and if it fails or changes nothing the store still
//! matches that server cart.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use tidewear_core::{CartLine, CartMode, CartState, Credential, LineKey, Product, ProductId, Size};

use crate::error::{CartError, LoadFailure, Result, SyncFailure, ValidationError, add_breadcrumb};
use crate::persistence::PersistenceLayer;
use crate::remote::{AddItem, RemoteCartGateway, RemoteError};
use crate::stock::{self, StockDecision};
use crate::store::CartStore;

/// Default timeout for remote cart calls.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// What an identity observation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same credential as last observed; nothing happened.
    Unchanged,
    /// Guest snapshot loaded (startup without a credential, or sign-out).
    Guest,
    /// Remote cart fetched (sign-in or credential change).
    Authenticated,
}

/// Identity state guarded by the operation lock.
#[derive(Debug, Default)]
struct Session {
    /// Whether any source has been loaded yet.
    loaded: bool,
    /// Credential of the active remote cart. `None` in guest mode.
    credential: Option<Credential>,
}

/// Remote counterpart of a mutation.
#[derive(Debug)]
enum RemoteOp {
    Add(AddItem),
    Update(ProductId, Size, u32),
    Remove(ProductId, Size),
    Clear,
}

/// Keeps the cart consistent between the guest cache and the remote cart.
pub struct SyncEngine<P, R> {
    persistence: P,
    remote: R,
    remote_timeout: Duration,
    store: RwLock<CartStore>,
    session: Mutex<Session>,
}

impl<P, R> std::fmt::Debug for SyncEngine<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("remote_timeout", &self.remote_timeout)
            .finish_non_exhaustive()
    }
}

impl<P: PersistenceLayer, R: RemoteCartGateway> SyncEngine<P, R> {
    /// Create an engine with an empty guest cart and no observation yet.
    #[must_use]
    pub fn new(persistence: P, remote: R) -> Self {
        Self {
            persistence,
            remote,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            store: RwLock::new(CartStore::new()),
            session: Mutex::new(Session::default()),
        }
    }

    /// Set the timeout applied to every remote call.
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// The guest cache.
    pub const fn persistence(&self) -> &P {
        &self.persistence
    }

    /// The remote cart gateway.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Copy of the current cart, including any optimistic change in flight.
    pub async fn snapshot(&self) -> CartState {
        self.store.read().await.snapshot()
    }

    /// Current total, recomputed from the lines.
    pub async fn total(&self) -> Decimal {
        self.store.read().await.total()
    }

    /// Current mode.
    pub async fn mode(&self) -> CartMode {
        self.store.read().await.mode()
    }

    /// Sum of quantities, for a cart badge.
    pub async fn item_count(&self) -> u64 {
        self.store.read().await.state().item_count()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Feed the current credential (or its absence) into the state machine.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Load` if the remote cart could not be fetched. The
    /// cart keeps its previous mode and lines.
    #[instrument(skip_all, fields(credential_present = credential.is_some()))]
    pub async fn observe(&self, credential: Option<Credential>) -> Result<Transition> {
        let mut session = self.session.lock().await;
        if session.loaded && session.credential == credential {
            debug!("Identity unchanged");
            return Ok(Transition::Unchanged);
        }

        let Some(credential) = credential else {
            self.load_guest(&mut session).await;
            info!(mode = %CartMode::Guest, "Cart source switched");
            return Ok(Transition::Guest);
        };

        let fetched = tokio::time::timeout(self.remote_timeout, self.remote.fetch(&credential))
            .await
            .map_err(|_| LoadFailure::Timeout(self.remote_timeout))
            .and_then(|result| result.map_err(LoadFailure::from));

        match fetched {
            Ok(lines) => {
                self.store
                    .write()
                    .await
                    .replace(lines, CartMode::Authenticated);
                session.credential = Some(credential);
                session.loaded = true;
                info!(mode = %CartMode::Authenticated, "Cart source switched");
                Ok(Transition::Authenticated)
            }
            Err(failure) => {
                if !session.loaded {
                    // Guest mode must reflect the stored slot before anything
                    // can overwrite it.
                    self.load_guest(&mut session).await;
                }
                Err(Self::fail(failure))
            }
        }
    }

    /// Persist the guest cart before teardown. Does nothing while
    /// authenticated or before anything was loaded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Sync` if the guest snapshot could not be written.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        let session = self.session.lock().await;
        if !session.loaded || session.credential.is_some() {
            return Ok(());
        }
        let lines = self.store.read().await.lines().to_vec();
        self.persistence
            .save(&lines)
            .await
            .map_err(|e| Self::fail(SyncFailure::from(e)))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product` in `size`.
    ///
    /// An existing line for the same product and size is incremented in
    /// place; otherwise a line is appended.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the quantity is zero, the size is
    /// not offered, or stock would be exceeded (nothing changes), and
    /// `CartError::Sync` if the write failed (the change is rolled back).
    #[instrument(skip(self, product), fields(op_id = %Uuid::new_v4(), product_id = %product.id, %size))]
    pub async fn add(&self, product: &Product, size: Size, quantity: u32) -> Result<CartState> {
        add_breadcrumb(
            "add",
            &[
                ("product_id", product.id.to_string()),
                ("size", size.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );
        let session = self.begin().await;

        if quantity == 0 {
            return Err(Self::fail(ValidationError::ZeroQuantity));
        }
        if !product.offers_size(&size) {
            return Err(Self::fail(ValidationError::SizeNotOffered {
                product_id: product.id,
                size,
            }));
        }

        let in_cart = self.store.read().await.state().quantity_of(product.id, &size);
        if let StockDecision::Reject(shortfall) = stock::check(quantity, in_cart, product.stock) {
            return Err(Self::fail(ValidationError::OutOfStock {
                key: LineKey::new(product.id, size),
                shortfall,
            }));
        }

        let line = CartLine::from_product(product, size.clone(), quantity);
        let op = RemoteOp::Add(AddItem {
            product_id: product.id,
            size,
            quantity,
        });
        self.run(&session, op, |store| store.add_or_increment(line))
            .await
    }

    /// Set the quantity of an existing line. `quantity <= 0` removes it.
    ///
    /// The line keeps its position.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if there is no such line or an
    /// increase would exceed stock, and `CartError::Sync` if the write failed
    /// (the change is rolled back).
    #[instrument(skip(self), fields(op_id = %Uuid::new_v4(), %product_id, %size))]
    pub async fn update(&self, product_id: ProductId, size: Size, quantity: i64) -> Result<CartState> {
        if quantity <= 0 {
            return self.remove(product_id, size).await;
        }
        add_breadcrumb(
            "update",
            &[
                ("product_id", product_id.to_string()),
                ("size", size.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let session = self.begin().await;

        let (current, available) = {
            let store = self.store.read().await;
            match store.state().find(product_id, &size) {
                Some(line) => (line.quantity, line.product.stock),
                None => {
                    return Err(Self::fail(ValidationError::UnknownLine(LineKey::new(
                        product_id, size,
                    ))));
                }
            }
        };

        if quantity > current
            && let StockDecision::Reject(shortfall) =
                stock::check(quantity - current, current, available)
        {
            return Err(Self::fail(ValidationError::OutOfStock {
                key: LineKey::new(product_id, size),
                shortfall,
            }));
        }

        let op = RemoteOp::Update(product_id, size.clone(), quantity);
        self.run(&session, op, |store| {
            store.set_quantity(product_id, &size, quantity);
        })
        .await
    }

    /// Remove a line. Removing an absent line changes nothing locally but is
    /// still confirmed with the active source.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Sync` if the write failed (the change is rolled
    /// back).
    #[instrument(skip(self), fields(op_id = %Uuid::new_v4(), %product_id, %size))]
    pub async fn remove(&self, product_id: ProductId, size: Size) -> Result<CartState> {
        add_breadcrumb(
            "remove",
            &[
                ("product_id", product_id.to_string()),
                ("size", size.to_string()),
            ],
        );
        let session = self.begin().await;

        let op = RemoteOp::Remove(product_id, size.clone());
        self.run(&session, op, |store| {
            store.remove(product_id, &size);
        })
        .await
    }

    /// Empty the cart and the active source.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Sync` if the write failed (the change is rolled
    /// back).
    #[instrument(skip(self), fields(op_id = %Uuid::new_v4()))]
    pub async fn clear(&self) -> Result<CartState> {
        add_breadcrumb("clear", &[]);
        let session = self.begin().await;
        self.run(&session, RemoteOp::Clear, CartStore::clear)
            .await
    }

    // =========================================================================
    // Protocol
    // =========================================================================

    /// Take the operation lock, loading the guest snapshot if nothing has
    /// been observed yet.
    async fn begin(&self) -> MutexGuard<'_, Session> {
        let mut session = self.session.lock().await;
        if !session.loaded {
            self.load_guest(&mut session).await;
        }
        session
    }

    /// Snapshot, apply, dispatch, then reconcile or roll back.
    async fn run(
        &self,
        session: &Session,
        op: RemoteOp,
        apply: impl FnOnce(&mut CartStore),
    ) -> Result<CartState> {
        let (snapshot, optimistic) = {
            let mut store = self.store.write().await;
            let snapshot = store.snapshot();
            apply(&mut store);
            (snapshot, store.lines().to_vec())
        };

        let Some(credential) = session.credential.clone() else {
            if let Err(e) = self.persistence.save(&optimistic).await {
                self.rollback(snapshot).await;
                return Err(Self::fail(SyncFailure::from(e)));
            }
            return Ok(self.snapshot().await);
        };

        let outcome = tokio::time::timeout(self.remote_timeout, self.dispatch(&credential, &op)).await;

        match outcome {
            Err(_) => {
                self.rollback(snapshot).await;
                Err(Self::fail(SyncFailure::Timeout(self.remote_timeout)))
            }
            Ok(Err(e)) => {
                self.rollback(snapshot).await;
                Err(Self::fail(SyncFailure::from(e)))
            }
            Ok(Ok(lines)) => {
                let mut store = self.store.write().await;
                store.replace(lines, CartMode::Authenticated);
                debug!(lines = store.lines().len(), "Reconciled with remote cart");
                Ok(store.snapshot())
            }
        }
    }

    /// Issue the remote operation. `clear` confirms with an empty cart.
    async fn dispatch(
        &self,
        credential: &Credential,
        op: &RemoteOp,
    ) -> std::result::Result<Vec<CartLine>, RemoteError> {
        match op {
            RemoteOp::Add(item) => self.remote.add_item(credential, item).await,
            RemoteOp::Update(product_id, size, quantity) => {
                self.remote
                    .update_item(credential, *product_id, size, *quantity)
                    .await
            }
            RemoteOp::Remove(product_id, size) => {
                self.remote.remove_item(credential, *product_id, size).await
            }
            RemoteOp::Clear => {
                self.remote.clear(credential).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn rollback(&self, snapshot: CartState) {
        self.store.write().await.restore(snapshot);
        debug!("Rolled back optimistic cart change");
    }

    async fn load_guest(&self, session: &mut Session) {
        let lines = self.persistence.load().await;
        self.store.write().await.replace(lines, CartMode::Guest);
        session.credential = None;
        session.loaded = true;
    }

    fn fail(err: impl Into<CartError>) -> CartError {
        let err = err.into();
        err.report();
        err
    }
}
