use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::action::{ActionDefinition, ActionRegistration};
use crate::CoreError;

/// Registry of actions keyed by name
#[derive(Default)]
pub struct ActionRegistry {
    actions: DashMap<String, ActionDefinition>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, overwriting an existing one with the same name.
    ///
    /// Fails only when the registration carries no usable name.
    pub fn register(&self, registration: impl Into<ActionRegistration>) -> Result<(), CoreError> {
        let definition = registration.into().into_definition()?;
        let name = definition.name.clone();

        if self.actions.insert(name.clone(), definition).is_some() {
            warn!(action = %name, "Action is already registered and will be overwritten");
        } else {
            debug!(action = %name, "Registered action");
        }

        Ok(())
    }

    /// Look up an action by name
    pub fn get(&self, name: &str) -> Option<ActionDefinition> {
        self.actions.get(name).map(|entry| entry.value().clone())
    }

    /// Sorted names of all registered actions
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is registered
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
