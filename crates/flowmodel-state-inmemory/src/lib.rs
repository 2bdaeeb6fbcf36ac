//! In-memory model store for the flowmodel runtime
//!
//! This crate provides an in-memory implementation of the `ModelRepository`
//! contract defined in flowmodel-core. It is primarily useful for development,
//! testing, and deployments where models do not need to survive a restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{InMemoryModelRepository, StoredModel};

use flowmodel_core::{FlowEngine, ModelRepository};

/// Provider for in-memory model repositories
///
/// Every repository created by one provider shares the same storage.
pub struct InMemoryStateStoreProvider {
    models: Arc<RwLock<HashMap<String, StoredModel>>>,
}

impl InMemoryStateStoreProvider {
    /// Create a provider with empty storage
    pub fn new() -> Self {
        Self {
            models: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a repository over this provider's storage
    pub fn create_repository(&self) -> Arc<InMemoryModelRepository> {
        Arc::new(InMemoryModelRepository::new(self.models.clone()))
    }

    /// Configure `engine` to persist through this provider's storage
    pub fn attach(&self, engine: &FlowEngine) -> Arc<InMemoryModelRepository> {
        let repository = self.create_repository();
        engine.set_model_repository(repository.clone() as Arc<dyn ModelRepository>);
        repository
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
