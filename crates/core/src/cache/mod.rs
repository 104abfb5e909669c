//! Identifier cache: fuzzy name/serial/MAC/IP resolution over local tables.
//!
//! Tables live in memory, hydrated from the [`CacheStore`] at startup and
//! replaced wholesale on refresh. Resolution itself never touches the
//! network; a miss with `retry` enabled triggers exactly one listing through
//! the [`InventorySource`] port before the single re-attempt.

mod lookup;
mod ports;

pub use ports::{CacheStore, InventorySource};

use std::collections::HashMap;
use std::sync::Arc;

use centralkit_domain::{CacheEntry, CacheKind, CentralError, Resolution, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Resolver over per-kind inventory tables.
///
/// Tables move `EMPTY -> POPULATED` once and never back: a failed refresh
/// keeps the previous table, and a refresh swaps the whole table under the
/// write lock so readers never observe a partial state.
pub struct IdentifierCache {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn InventorySource>,
    tables: RwLock<HashMap<CacheKind, Vec<CacheEntry>>>,
}

impl IdentifierCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, source: Arc<dyn InventorySource>) -> Self {
        Self { store, source, tables: RwLock::new(HashMap::new()) }
    }

    /// Load every kind's table from the persistent store. Call once at
    /// startup; a fresh store yields empty tables, which is fine.
    ///
    /// # Errors
    /// Returns `CentralError::Database` when the store fails.
    pub async fn hydrate(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        for kind in CacheKind::ALL {
            let entries = self.store.load_table(kind).await?;
            debug!(kind = %kind, records = entries.len(), "cache table hydrated");
            tables.insert(kind, entries);
        }
        Ok(())
    }

    /// Resolve a human-supplied identifier to a cached record.
    ///
    /// Purely local when `retry` is false. When `retry` is true a miss
    /// refreshes the kind's table from the provider and re-attempts once;
    /// a second miss is a final [`Resolution::NotFound`].
    ///
    /// # Errors
    /// Only the retry path can fail, with the refresh's listing or store
    /// error. The lookup itself is infallible.
    pub async fn resolve(&self, kind: CacheKind, query: &str, retry: bool) -> Result<Resolution> {
        let resolution = self.lookup_local(kind, query, None).await;
        if !resolution.is_not_found() || !retry {
            return Ok(resolution);
        }

        debug!(kind = %kind, query, "cache miss, refreshing from provider");
        self.refresh(kind, None).await?;
        Ok(self.lookup_local(kind, query, None).await)
    }

    /// Resolve a template name, optionally scoped to one group.
    ///
    /// Templates are only unique per group; an unscoped lookup across groups
    /// can legitimately be ambiguous.
    ///
    /// # Errors
    /// Same as [`IdentifierCache::resolve`].
    pub async fn resolve_template(
        &self,
        group: Option<&str>,
        query: &str,
        retry: bool,
    ) -> Result<Resolution> {
        let resolution = self.lookup_local(CacheKind::Template, query, group).await;
        if !resolution.is_not_found() || !retry {
            return Ok(resolution);
        }

        debug!(group, query, "template cache miss, refreshing from provider");
        self.refresh(CacheKind::Template, None).await?;
        Ok(self.lookup_local(CacheKind::Template, query, group).await)
    }

    /// Replace one kind's table, from the provider listing (`data: None`) or
    /// from caller-supplied records after a write operation.
    ///
    /// The new table is persisted through the store before the in-memory
    /// swap; on any failure the previous table stays in place.
    ///
    /// # Errors
    /// `CentralError::InvalidInput` when `data` contains records of another
    /// kind, otherwise the listing or store error.
    pub async fn refresh(&self, kind: CacheKind, data: Option<Vec<CacheEntry>>) -> Result<()> {
        let entries = match data {
            Some(entries) => entries,
            None => match self.source.list(kind).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "inventory listing failed, keeping cached table");
                    return Err(e);
                }
            },
        };

        if let Some(stray) = entries.iter().find(|e| e.kind() != kind) {
            return Err(CentralError::InvalidInput(format!(
                "refresh of {kind} table given a {} record",
                stray.kind()
            )));
        }

        self.store.replace_table(kind, &entries).await?;
        let count = entries.len();
        self.tables.write().await.insert(kind, entries);
        info!(kind = %kind, records = count, "cache table replaced");
        Ok(())
    }

    /// Records of one kind currently in memory.
    pub async fn entries(&self, kind: CacheKind) -> Vec<CacheEntry> {
        self.tables.read().await.get(&kind).cloned().unwrap_or_default()
    }

    async fn lookup_local(
        &self,
        kind: CacheKind,
        query: &str,
        group_scope: Option<&str>,
    ) -> Resolution {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&kind) else {
            return Resolution::NotFound;
        };

        match group_scope {
            None => lookup::lookup(kind, table, query),
            Some(group) => {
                let scoped: Vec<CacheEntry> = table
                    .iter()
                    .filter(|e| match e {
                        CacheEntry::Template(t) => t.group.eq_ignore_ascii_case(group),
                        _ => false,
                    })
                    .cloned()
                    .collect();
                lookup::lookup(kind, &scoped, query)
            }
        }
    }
}
