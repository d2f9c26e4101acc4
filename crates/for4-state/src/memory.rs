use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::repository::{Repository, RepositoryError, RepositoryItem};

/// A repository that keeps its items in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository<V> {
    items: RwLock<HashMap<String, V>>,
}

impl<V> MemoryRepository<V> {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl<V: RepositoryItem> Repository<V> for MemoryRepository<V> {
    async fn get(&self, key: String) -> Result<Option<V>, RepositoryError> {
        Ok(self.items.read().await.get(&key).cloned())
    }

    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn set(&self, key: String, value: V) -> Result<(), RepositoryError> {
        self.items.write().await.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: String) -> Result<(), RepositoryError> {
        self.items.write().await.remove(&key);
        Ok(())
    }
}
