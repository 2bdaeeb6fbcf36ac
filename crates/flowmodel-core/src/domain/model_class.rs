//! Model classes: constructors for model instances and owners of flow tables

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

use crate::domain::flow_definition::FlowDefinition;
use crate::domain::model::{CreateModelOptions, FlowModel};
use crate::types::Props;
use crate::CoreError;

/// Initialization hook, run once per instance right after creation
pub type InitHook =
    Arc<dyn Fn(&FlowModel, &CreateModelOptions) -> Result<(), CoreError> + Send + Sync>;

/// A model constructor registered under a class name.
///
/// A class owns its flows. A class that `extends` another inherits the
/// ancestor's flows; flows with the same key on the more specific class win.
pub struct ModelClass {
    name: String,
    parent: Option<Arc<ModelClass>>,
    accepts_flows: bool,
    default_props: Props,
    on_init: Option<InitHook>,
    flows: RwLock<Vec<FlowDefinition>>,
}

impl ModelClass {
    /// Create a root class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            accepts_flows: true,
            default_props: Props::new(),
            on_init: None,
            flows: RwLock::new(Vec::new()),
        }
    }

    /// Inherit flows and default props from `parent`
    pub fn extends(mut self, parent: Arc<ModelClass>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Build a class that cannot hold flows
    pub fn without_flows(mut self) -> Self {
        self.accepts_flows = false;
        self
    }

    /// Props every new instance starts with, below the creation options' props
    pub fn with_default_props(mut self, props: Props) -> Self {
        self.default_props = props;
        self
    }

    /// Set the initialization hook
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FlowModel, &CreateModelOptions) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct ancestor
    pub fn parent(&self) -> Option<&Arc<ModelClass>> {
        self.parent.as_ref()
    }

    /// Whether flows can be registered on this class
    pub fn accepts_flows(&self) -> bool {
        self.accepts_flows
    }

    /// Whether this class is `name` or extends it
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.parent.as_ref().is_some_and(|p| p.is_a(name))
    }

    /// Default props merged down the class chain, most specific last
    pub fn default_props(&self) -> Props {
        let mut props = self
            .parent
            .as_ref()
            .map(|p| p.default_props())
            .unwrap_or_default();
        for (key, value) in &self.default_props {
            props.insert(key.clone(), value.clone());
        }
        props
    }

    pub(crate) fn init_hooks(&self) -> Vec<InitHook> {
        let mut hooks = self
            .parent
            .as_ref()
            .map(|p| p.init_hooks())
            .unwrap_or_default();
        if let Some(hook) = &self.on_init {
            hooks.push(hook.clone());
        }
        hooks
    }

    /// Store a flow on this class.
    ///
    /// Returns `false` without storing anything if the class does not accept
    /// flows. A flow with an existing key replaces it in place.
    pub fn register_flow(&self, flow: FlowDefinition) -> bool {
        if !self.accepts_flows {
            return false;
        }

        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        match flows.iter_mut().find(|existing| existing.key == flow.key) {
            Some(existing) => {
                warn!(
                    model_class = %self.name,
                    flow_key = %flow.key,
                    "Flow is already registered and will be overwritten"
                );
                *existing = flow;
            }
            None => flows.push(flow),
        }
        true
    }

    /// Flows registered directly on this class
    pub fn own_flows(&self) -> Vec<FlowDefinition> {
        self.flows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Effective flow set: ancestor flows first, overridden and extended by this class
    pub fn flows(&self) -> Vec<FlowDefinition> {
        let mut effective = self
            .parent
            .as_ref()
            .map(|p| p.flows())
            .unwrap_or_default();

        for flow in self.own_flows() {
            match effective.iter_mut().find(|existing| existing.key == flow.key) {
                Some(existing) => *existing = flow,
                None => effective.push(flow),
            }
        }

        effective
    }

    /// Resolve a flow by key, most specific class first
    pub fn get_flow(&self, key: &str) -> Option<FlowDefinition> {
        let own = self
            .flows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|flow| flow.key == key)
            .cloned();

        own.or_else(|| self.parent.as_ref().and_then(|p| p.get_flow(key)))
    }

    /// Effective flows with `auto = true`, in effective order
    pub fn auto_flows(&self) -> Vec<FlowDefinition> {
        self.flows().into_iter().filter(|flow| flow.auto).collect()
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("accepts_flows", &self.accepts_flows)
            .field(
                "flows",
                &self.own_flows().iter().map(|f| f.key.clone()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
