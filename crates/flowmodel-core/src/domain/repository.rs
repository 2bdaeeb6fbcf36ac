//! Repository contract for model persistence
//!
//! The engine treats persistence as an opaque async boundary. External crates
//! implement [`ModelRepository`] to plug in a storage backend; the engine only
//! checks a loaded record for a non-empty `uid`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::FlowModel;
use crate::types::{Props, StepParams};
use crate::CoreError;

/// Persisted form of a model instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Stable identity
    pub uid: String,

    /// Model class name
    #[serde(rename = "use")]
    pub use_class: String,

    /// Uid of the owning instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Props at the time of saving
    #[serde(default)]
    pub props: Props,

    /// Per-(flow, step) params
    #[serde(default)]
    pub step_params: StepParams,

    /// Remaining creation options
    #[serde(flatten)]
    pub extra: Props,
}

/// Persistence backend for model instances
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Load the record stored for `uid`
    async fn load(&self, uid: &str) -> Result<Option<ModelRecord>, CoreError>;

    /// Persist a model instance
    async fn save(&self, model: &FlowModel) -> Result<(), CoreError>;

    /// Delete the record stored for `uid`
    async fn destroy(&self, uid: &str) -> Result<(), CoreError>;
}

/// Memory implementation for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory model repository backed by a concurrent map
    #[derive(Clone, Default)]
    pub struct MemoryModelRepository {
        records: Arc<DashMap<String, ModelRecord>>,
    }

    impl MemoryModelRepository {
        /// Create an empty repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Whether a record is stored for `uid`
        pub fn contains(&self, uid: &str) -> bool {
            self.records.contains_key(uid)
        }

        /// Number of stored records
        pub fn len(&self) -> usize {
            self.records.len()
        }

        /// Whether no record is stored
        pub fn is_empty(&self) -> bool {
            self.records.is_empty()
        }

        /// Store a record directly, bypassing a live instance
        pub fn insert_record(&self, record: ModelRecord) {
            self.records.insert(record.uid.clone(), record);
        }
    }

    #[async_trait]
    impl ModelRepository for MemoryModelRepository {
        async fn load(&self, uid: &str) -> Result<Option<ModelRecord>, CoreError> {
            Ok(self.records.get(uid).map(|record| record.clone()))
        }

        async fn save(&self, model: &FlowModel) -> Result<(), CoreError> {
            self.records.insert(model.uid().to_string(), model.to_record());
            Ok(())
        }

        async fn destroy(&self, uid: &str) -> Result<(), CoreError> {
            self.records.remove(uid);
            Ok(())
        }
    }
}
