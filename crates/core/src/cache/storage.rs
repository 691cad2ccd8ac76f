//! Durable cache store seam.
//!
//! The lifecycle manager and the router only talk to storage through
//! [`CacheStorage`], so tests can substitute a store that fails on demand.

use super::connection::CacheDb;
use super::entries::CachedResponse;
use crate::Error;

/// Named, versioned key-value store of responses.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Store all entries in a generation atomically and mark it populated.
    async fn populate(&self, name: &str, entries: Vec<CachedResponse>) -> Result<usize, Error>;

    /// Look up a single request key.
    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, Error>;

    /// Enumerate every generation name.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Whether a generation holds a complete app shell.
    async fn is_populated(&self, name: &str) -> Result<bool, Error>;
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let created = self.open_generation(name).await?;
        if created {
            tracing::debug!(generation = name, "created cache generation");
        }
        Ok(())
    }

    async fn populate(&self, name: &str, entries: Vec<CachedResponse>) -> Result<usize, Error> {
        self.populate_generation(name, entries).await
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        self.match_entry(name, key).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }

    async fn is_populated(&self, name: &str) -> Result<bool, Error> {
        self.is_generation_populated(name).await
    }
}
