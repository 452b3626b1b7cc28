//! Module storage.
//!
//! The default build keeps modules in process memory; the `db` feature
//! swaps in a PostgreSQL-backed store behind the same trait.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{ModulePatch, PvModule};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a module named '{0}' already exists")]
    DuplicateName(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence operations for PV modules. Names are unique across the
/// store; `update` and `delete` report a missing id rather than failing.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn insert(&self, module: PvModule) -> Result<PvModule, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<PvModule>, StoreError>;
    /// Modules ordered by creation time, then name.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<PvModule>, StoreError>;
    async fn update(&self, id: Uuid, patch: ModulePatch) -> Result<Option<PvModule>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Build the store selected by the build features.
pub async fn connect(cfg: &Config) -> Result<Arc<dyn ModuleStore>> {
    #[cfg(feature = "db")]
    {
        let store = pg::PgStore::connect(&cfg.db.url).await?;
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "db"))]
    {
        let _ = cfg;
        Ok(Arc::new(memory::MemoryStore::new()))
    }
}
