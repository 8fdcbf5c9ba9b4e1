//! Status enums for the cart.

use serde::{Deserialize, Serialize};

/// Which source is authoritative for the cart.
///
/// Exactly one source is active at a time: the local guest cache while no
/// credential is held, the server cart record once one is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartMode {
    /// No credential; the durable local cache is authoritative.
    #[default]
    Guest,
    /// Credential held; the remote cart record is authoritative.
    Authenticated,
}

impl std::fmt::Display for CartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}
