use async_trait::async_trait;
use tlspol_domain::{PolicyEntry, TlspolError};

/// Domain-keyed policy cache.
///
/// Keys are normalised domains. Implementations are shared across the
/// request handlers and the prefetcher, so every operation must be safe
/// under concurrent use.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get(&self, domain: &str) -> Option<PolicyEntry>;

    async fn set(&self, entry: PolicyEntry);

    async fn remove(&self, domain: &str);

    /// Drop every entry.
    async fn purge(&self);

    /// Snapshot copy of all entries, taken under the read lock.
    async fn items(&self) -> Vec<PolicyEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the current state if dirty.
    async fn save(&self) -> Result<(), TlspolError>;

    /// Remove entries that are mis-keyed, damaged by the historical
    /// report-duplication bug, or both aged out and expired.
    async fn tidy(&self);

    /// Stop background work and perform a final save.
    async fn close(&self);
}
