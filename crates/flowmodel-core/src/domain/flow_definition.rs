use crate::domain::step::StepDefinition;
use crate::CoreError;

/// A named, ordered sequence of steps attached to a model class
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    /// Key of the flow, unique within its model class
    pub key: String,

    /// Human-readable title
    pub title: Option<String>,

    /// Marks the flow for [`FlowEngine::apply_auto_flows`].
    ///
    /// Creating a model never applies flows by itself; the caller runs auto
    /// flows once the instance is initialized.
    ///
    /// [`FlowEngine::apply_auto_flows`]: crate::FlowEngine::apply_auto_flows
    pub auto: bool,

    steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    /// Create an empty on-demand flow
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: None,
            auto: false,
            steps: Vec::new(),
        }
    }

    /// Mark the flow as auto-applied
    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a step; a step with the same key is replaced in place
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.insert_step(step);
        self
    }

    /// Insert a step, keeping the position of an existing step with the same key
    pub fn insert_step(&mut self, step: StepDefinition) {
        match self.steps.iter_mut().find(|existing| existing.key == step.key) {
            Some(existing) => *existing = step,
            None => self.steps.push(step),
        }
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Look up a step by key
    pub fn step(&self, key: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.key == key)
    }

    /// Validate the flow definition
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.key.trim().is_empty() {
            return Err(CoreError::InvalidRegistration(
                "Flow key must not be empty".to_string(),
            ));
        }

        if let Some(step) = self.steps.iter().find(|step| step.key.trim().is_empty()) {
            return Err(CoreError::InvalidRegistration(format!(
                "Flow '{}' has a step with an empty key (title: {:?})",
                self.key, step.title
            )));
        }

        Ok(())
    }
}
