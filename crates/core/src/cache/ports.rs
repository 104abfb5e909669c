//! Ports for cache persistence and inventory listing.

use async_trait::async_trait;
use centralkit_domain::{CacheEntry, CacheKind, Result};

/// Persists cache tables between process runs.
///
/// Implemented by the sqlite document store in infra; mocked in tests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load every record of one kind, or an empty vec for a fresh store.
    async fn load_table(&self, kind: CacheKind) -> Result<Vec<CacheEntry>>;

    /// Replace the kind's table with `entries` in one transaction.
    async fn replace_table(&self, kind: CacheKind, entries: &[CacheEntry]) -> Result<()>;
}

/// Lists the full current inventory of one kind from the provider.
///
/// Implemented by the Central API adapter in infra.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch all records of `kind`, every page collected.
    ///
    /// # Errors
    /// Returns the normalized error for the failed listing call; the cache
    /// keeps its previous table in that case.
    async fn list(&self, kind: CacheKind) -> Result<Vec<CacheEntry>>;
}
