use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::model_class::ModelClass;

/// Registry of model classes keyed by name
#[derive(Default)]
pub struct ModelClassRegistry {
    classes: DashMap<String, Arc<ModelClass>>,
}

impl ModelClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under `name`, overwriting with a warning
    pub fn register(&self, name: impl Into<String>, class: Arc<ModelClass>) {
        let name = name.into();
        if class.name() != name {
            debug!(
                model_class = %name,
                class_name = %class.name(),
                "Registering model class under an alias"
            );
        }

        if self.classes.insert(name.clone(), class).is_some() {
            warn!(model_class = %name, "Model class is already registered and will be overwritten");
        } else {
            debug!(model_class = %name, "Registered model class");
        }
    }

    /// Register every entry of `classes`
    pub fn register_all<I, S>(&self, classes: I)
    where
        I: IntoIterator<Item = (S, Arc<ModelClass>)>,
        S: Into<String>,
    {
        for (name, class) in classes {
            self.register(name, class);
        }
    }

    /// Look up a class
    pub fn get(&self, name: &str) -> Option<Arc<ModelClass>> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshot of the whole registry
    pub fn snapshot(&self) -> HashMap<String, Arc<ModelClass>> {
        self.classes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
