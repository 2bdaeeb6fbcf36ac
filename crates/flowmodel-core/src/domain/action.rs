use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::domain::step::StepHandler;
use crate::CoreError;

/// A named, reusable unit of logic referenced by flow steps
#[derive(Clone)]
pub struct ActionDefinition {
    /// Registry key
    pub name: String,

    /// Human-readable title
    pub title: Option<String>,

    /// Schema for an externally rendered configuration form
    pub ui_schema: Option<Value>,

    /// Lowest-priority params layer for steps using this action
    pub default_params: Option<Value>,

    /// Handler run when a step references this action
    pub handler: Arc<dyn StepHandler>,
}

impl ActionDefinition {
    /// Create a definition carrying its own name
    pub fn new(name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        ActionOptions::new(handler).into_definition(name)
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set default params
    pub fn with_default_params(mut self, params: Value) -> Self {
        self.default_params = Some(params);
        self
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("ui_schema", &self.ui_schema)
            .field("default_params", &self.default_params)
            .finish_non_exhaustive()
    }
}

/// Everything of an action except its name
#[derive(Clone)]
pub struct ActionOptions {
    /// Human-readable title
    pub title: Option<String>,

    /// Schema for an externally rendered configuration form
    pub ui_schema: Option<Value>,

    /// Lowest-priority params layer
    pub default_params: Option<Value>,

    /// Handler
    pub handler: Arc<dyn StepHandler>,
}

impl ActionOptions {
    /// Options with only a handler
    pub fn new(handler: impl StepHandler + 'static) -> Self {
        Self {
            title: None,
            ui_schema: None,
            default_params: None,
            handler: Arc::new(handler),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach a ui schema
    pub fn with_ui_schema(mut self, ui_schema: Value) -> Self {
        self.ui_schema = Some(ui_schema);
        self
    }

    /// Set default params
    pub fn with_default_params(mut self, params: Value) -> Self {
        self.default_params = Some(params);
        self
    }

    fn into_definition(self, name: impl Into<String>) -> ActionDefinition {
        ActionDefinition {
            name: name.into(),
            title: self.title,
            ui_schema: self.ui_schema,
            default_params: self.default_params,
            handler: self.handler,
        }
    }
}

/// The two accepted registration forms: a name with options, or a full definition
pub enum ActionRegistration {
    /// `(name, options)`
    Named(String, ActionOptions),
    /// Definition carrying its own name
    Definition(ActionDefinition),
}

impl ActionRegistration {
    /// Normalize to a definition, rejecting forms without a usable name
    pub fn into_definition(self) -> Result<ActionDefinition, CoreError> {
        let definition = match self {
            ActionRegistration::Named(name, options) => options.into_definition(name),
            ActionRegistration::Definition(definition) => definition,
        };

        if definition.name.trim().is_empty() {
            return Err(CoreError::InvalidRegistration(
                "Invalid arguments for register_action: action name must not be empty".to_string(),
            ));
        }

        Ok(definition)
    }
}

impl From<ActionDefinition> for ActionRegistration {
    fn from(definition: ActionDefinition) -> Self {
        ActionRegistration::Definition(definition)
    }
}

impl<S: Into<String>> From<(S, ActionOptions)> for ActionRegistration {
    fn from((name, options): (S, ActionOptions)) -> Self {
        ActionRegistration::Named(name.into(), options)
    }
}
