//! In-memory module store used by the default build.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{ModulePatch, PvModule};

use super::{ModuleStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    modules: RwLock<HashMap<Uuid, PvModule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn insert(&self, module: PvModule) -> Result<PvModule, StoreError> {
        let mut modules = self.modules.write();
        if modules.values().any(|m| m.name == module.name) {
            return Err(StoreError::DuplicateName(module.name));
        }
        modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PvModule>, StoreError> {
        Ok(self.modules.read().get(&id).cloned())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<PvModule>, StoreError> {
        let mut all: Vec<PvModule> = self.modules.read().values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, id: Uuid, patch: ModulePatch) -> Result<Option<PvModule>, StoreError> {
        let mut modules = self.modules.write();
        // Existence first: a missing id never reports a name clash.
        if !modules.contains_key(&id) {
            return Ok(None);
        }
        if let Some(new_name) = &patch.name {
            if modules.values().any(|m| m.id != id && &m.name == new_name) {
                return Err(StoreError::DuplicateName(new_name.clone()));
            }
        }
        match modules.get_mut(&id) {
            Some(module) => {
                patch.apply_to(module);
                Ok(Some(module.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.modules.write().remove(&id).is_some())
    }
}
