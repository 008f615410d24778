use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{StateScope, StateStore, StoreError};

/// In-memory backend. Scope keys are logically partitioned exactly like the
/// durable backend so tests exercise the same visibility contract.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<(StateScope, String), String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, scope: &StateScope, slot: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(scope.clone(), slot.to_owned())).cloned())
    }

    async fn set(&self, scope: &StateScope, slot: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert((scope.clone(), slot.to_owned()), value.to_owned());
        Ok(())
    }

    async fn delete(&self, scope: &StateScope, slot: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(scope.clone(), slot.to_owned()));
        Ok(())
    }
}
