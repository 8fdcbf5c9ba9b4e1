//! Identity signal feeding the sync engine.
//!
//! The identity provider owns an [`IdentityBridge`] and calls
//! [`sign_in`](IdentityBridge::sign_in) / [`sign_out`](IdentityBridge::sign_out)
//! as the shopper's session changes. [`follow_identity`] forwards every value
//! to [`SyncEngine::observe`]; repeated values are harmless because the
//! engine ignores an unchanged credential.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tidewear_core::Credential;

use crate::engine::SyncEngine;
use crate::persistence::PersistenceLayer;
use crate::remote::RemoteCartGateway;

/// Publishes the current credential (or its absence).
#[derive(Debug)]
pub struct IdentityBridge {
    tx: watch::Sender<Option<Credential>>,
}

impl IdentityBridge {
    /// Start with `initial` as the current identity.
    #[must_use]
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// The shopper signed in (or their token was refreshed).
    pub fn sign_in(&self, credential: Credential) {
        info!("Shopper signed in");
        self.tx.send_replace(Some(credential));
    }

    /// The shopper signed out.
    pub fn sign_out(&self) {
        info!("Shopper signed out");
        self.tx.send_replace(None);
    }

    /// The remote service rejected the credential; drop back to guest.
    pub fn invalidate(&self) {
        warn!("Credential rejected by cart service, signing out");
        self.tx.send_replace(None);
    }

    /// Re-publish the current identity unchanged.
    pub fn touch(&self) {
        self.tx.send_modify(|_| {});
    }

    /// Current credential, if signed in.
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    /// Receiver for [`follow_identity`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }
}

impl Default for IdentityBridge {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Feed every identity change into `engine` until the bridge is dropped.
///
/// The value current at call time is observed first. Load failures are
/// already reported by the engine; an unauthorized response is left for the
/// identity provider to act on.
pub async fn follow_identity<P, R>(
    engine: Arc<SyncEngine<P, R>>,
    mut rx: watch::Receiver<Option<Credential>>,
) where
    P: PersistenceLayer,
    R: RemoteCartGateway,
{
    loop {
        let credential = rx.borrow_and_update().clone();
        match engine.observe(credential).await {
            Ok(transition) => debug!(?transition, "Identity observed"),
            Err(e) if e.is_unauthorized() => {
                warn!("Cart service rejected the new credential");
            }
            Err(_) => {}
        }

        if rx.changed().await.is_err() {
            debug!("Identity bridge dropped, stopping");
            break;
        }
    }
}
