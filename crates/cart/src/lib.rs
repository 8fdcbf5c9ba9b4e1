//! Tidewear cart synchronization.
//!
//! Keeps one shopper-facing cart consistent across two sources: a local
//! guest cache used while nobody is signed in, and the remote cart service
//! used while a credential is held.
//!
//! # Modules
//!
//! - [`engine`] - the state machine and mutation protocol
//! - [`store`] - in-memory cart state
//! - [`persistence`] - guest cart cache (JSON file, in-memory)
//! - [`remote`] - remote cart gateway (HTTP, in-memory)
//! - [`identity`] - credential signal feeding the engine
//! - [`stock`] - client-side stock check
//! - [`config`] - environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tidewear_cart::{CartConfig, HttpCartGateway, JsonFilePersistence, SyncEngine};
//!
//! let config = CartConfig::from_env()?;
//! let engine = SyncEngine::new(
//!     JsonFilePersistence::new(&config.cart_path),
//!     HttpCartGateway::new(config.api_url.clone()),
//! )
//! .with_remote_timeout(config.remote_timeout);
//!
//! engine.observe(None).await?;
//! engine.add(&product, size, 1).await?;
//! println!("{}", engine.total().await);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod remote;
pub mod stock;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use engine::{SyncEngine, Transition};
pub use error::{CartError, LoadFailure, Result, SyncFailure, ValidationError};
pub use identity::{IdentityBridge, follow_identity};
pub use persistence::{JsonFilePersistence, MemoryPersistence, PersistenceError, PersistenceLayer};
pub use remote::{AddItem, HttpCartGateway, MemoryCartGateway, RemoteCartGateway, RemoteError};
pub use store::CartStore;
