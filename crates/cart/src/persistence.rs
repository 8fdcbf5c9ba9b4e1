//! Durable guest cart cache.
//!
//! Holds the guest cart between runs in a single slot. Only the engine's guest
//! mode touches it; while a credential is held the remote cart is
//! authoritative and this slot is neither read nor written.
//!
//! Loading fails soft: an absent, unreadable or malformed slot is an empty
//! cart, never an error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidewear_core::{CartLine, CartState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors writing the guest cart slot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be encoded.
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The store refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for the guest cart snapshot.
#[async_trait]
pub trait PersistenceLayer: Send + Sync {
    /// Read the stored snapshot. Absent or malformed data is an empty cart.
    async fn load(&self) -> Vec<CartLine>;

    /// Overwrite the stored snapshot with `lines`.
    async fn save(&self, lines: &[CartLine]) -> Result<(), PersistenceError>;
}

/// On-disk document for the guest cart slot.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCart {
    saved_at: DateTime<Utc>,
    lines: Vec<CartLine>,
}

// =============================================================================
// JsonFilePersistence
// =============================================================================

/// Guest cart slot backed by a JSON file.
///
/// Writes go to a sibling temp file that is renamed over the slot, so an
/// interrupted write leaves the previous snapshot in place.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Create a slot at `path`. Nothing is touched until the first load/save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the slot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceLayer for JsonFilePersistence {
    async fn load(&self) -> Vec<CartLine> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No guest cart snapshot");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read guest cart snapshot");
                return Vec::new();
            }
        };

        let stored: StoredCart = match serde_json::from_slice(&bytes) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt guest cart snapshot");
                return Vec::new();
            }
        };

        if !CartState::lines_are_well_formed(&stored.lines) {
            warn!(
                path = %self.path.display(),
                "Discarding guest cart snapshot with duplicate or empty lines"
            );
            return Vec::new();
        }

        debug!(
            path = %self.path.display(),
            lines = stored.lines.len(),
            saved_at = %stored.saved_at,
            "Loaded guest cart snapshot"
        );
        stored.lines
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = StoredCart {
            saved_at: Utc::now(),
            lines: lines.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), lines = lines.len(), "Saved guest cart snapshot");
        Ok(())
    }
}

// =============================================================================
// MemoryPersistence
// =============================================================================

/// In-memory guest cart slot for tests.
///
/// Saves can be made to fail on demand to exercise rollback.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<Vec<CartLine>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot already holding `lines`.
    #[must_use]
    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        Self {
            slot: Mutex::new(Some(lines)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current slot contents, `None` if never written.
    pub async fn stored(&self) -> Option<Vec<CartLine>> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl PersistenceLayer for MemoryPersistence {
    async fn load(&self) -> Vec<CartLine> {
        self.slot.lock().await.clone().unwrap_or_default()
    }

    async fn save(&self, lines: &[CartLine]) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory slot set to fail".to_string(),
            ));
        }
        *self.slot.lock().await = Some(lines.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tidewear_core::{Product, ProductId, Size};

    fn line(id: i32, size: &str, quantity: u32) -> CartLine {
        let product = Product {
            id: ProductId::new(id),
            title: format!("Tee {id}"),
            price: Decimal::new(1250, 2),
            stock: 10,
            images: Vec::new(),
            sizes: Vec::new(),
        };
        CartLine::from_product(&product, Size::parse(size).unwrap(), quantity)
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let slot = JsonFilePersistence::new(dir.path().join("cart.json"));
        assert!(slot.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let slot = JsonFilePersistence::new(dir.path().join("nested/dir/cart.json"));
        let lines = vec![line(1, "M", 2), line(2, "L", 1)];

        slot.save(&lines).await.unwrap();
        assert_eq!(slot.load().await, lines);
        assert!(!slot.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let slot = JsonFilePersistence::new(dir.path().join("cart.json"));

        slot.save(&[line(1, "M", 2)]).await.unwrap();
        slot.save(&[]).await.unwrap();
        assert!(slot.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let slot = JsonFilePersistence::new(&path);
        assert!(slot.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_bare_array_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, b"[]").unwrap();

        assert!(JsonFilePersistence::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_lines_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        let document = StoredCart {
            saved_at: Utc::now(),
            lines: vec![line(1, "M", 1), line(1, "M", 3)],
        };
        std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

        assert!(JsonFilePersistence::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_fail_switch() {
        let slot = MemoryPersistence::new();
        assert!(slot.stored().await.is_none());

        slot.save(&[line(1, "M", 1)]).await.unwrap();
        assert_eq!(slot.save_count(), 1);

        slot.set_fail_saves(true);
        assert!(matches!(
            slot.save(&[]).await,
            Err(PersistenceError::Unavailable(_))
        ));
        assert_eq!(slot.load().await.len(), 1);
        assert_eq!(slot.save_count(), 1);
    }
}
