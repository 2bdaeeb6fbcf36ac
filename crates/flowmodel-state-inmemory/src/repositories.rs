use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use flowmodel_core::{
    domain::repository::{ModelRecord, ModelRepository},
    CoreError, FlowModel,
};

/// A record as kept by the in-memory store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    /// The persisted record
    pub record: ModelRecord,
    /// Number of saves for this uid
    pub revision: u64,
    /// Time of the first save
    pub created_at: DateTime<Utc>,
    /// Time of the latest save
    pub saved_at: DateTime<Utc>,
}

/// In-memory implementation of the ModelRepository
#[derive(Clone)]
pub struct InMemoryModelRepository {
    models: Arc<RwLock<HashMap<String, StoredModel>>>,
}

impl InMemoryModelRepository {
    /// Create a repository over shared storage
    pub fn new(models: Arc<RwLock<HashMap<String, StoredModel>>>) -> Self {
        Self { models }
    }

    /// Stored entry for `uid`, with its bookkeeping
    pub async fn stored(&self, uid: &str) -> Option<StoredModel> {
        self.models.read().await.get(uid).cloned()
    }

    /// Sorted uids of every stored record
    pub async fn list_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.models.read().await.keys().cloned().collect();
        uids.sort();
        uids
    }

    /// Stored records whose parent is `parent_id`
    pub async fn find_children(&self, parent_id: &str) -> Vec<ModelRecord> {
        let models = self.models.read().await;
        let mut children: Vec<ModelRecord> = models
            .values()
            .filter(|stored| stored.record.parent_id.as_deref() == Some(parent_id))
            .map(|stored| stored.record.clone())
            .collect();
        children.sort_by(|a, b| a.uid.cmp(&b.uid));
        children
    }

    /// Serialize every stored entry, keyed by uid
    pub async fn export(&self) -> Result<serde_json::Value, CoreError> {
        let models = self.models.read().await;
        Ok(serde_json::to_value(&*models)?)
    }
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn load(&self, uid: &str) -> Result<Option<ModelRecord>, CoreError> {
        let models = self.models.read().await;
        Ok(models.get(uid).map(|stored| stored.record.clone()))
    }

    async fn save(&self, model: &FlowModel) -> Result<(), CoreError> {
        let record = model.to_record();
        if record.uid.is_empty() {
            return Err(CoreError::RepositoryError(
                "Cannot save a model without uid".to_string(),
            ));
        }

        let now = Utc::now();
        let mut models = self.models.write().await;
        let (revision, created_at) = models
            .get(&record.uid)
            .map(|existing| (existing.revision + 1, existing.created_at))
            .unwrap_or((1, now));

        debug!(uid = %record.uid, revision, "Saving model record");
        models.insert(
            record.uid.clone(),
            StoredModel {
                record,
                revision,
                created_at,
                saved_at: now,
            },
        );
        Ok(())
    }

    async fn destroy(&self, uid: &str) -> Result<(), CoreError> {
        let mut models = self.models.write().await;
        if models.remove(uid).is_some() {
            debug!(uid = %uid, "Destroyed model record");
        }
        Ok(())
    }
}
