//! In-memory store for tests and no-persistence configurations.

use super::StateStore;
use crate::error::EngineError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.map
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
