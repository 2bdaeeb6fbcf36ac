//! Model instances: uniquely identified nodes holding observable props

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::watch;

use crate::application::apply_flow_cache::FlowOutcome;
use crate::application::flow_engine::{EngineInner, FlowEngine};
use crate::domain::flow_definition::FlowDefinition;
use crate::domain::model_class::ModelClass;
use crate::domain::repository::ModelRecord;
use crate::types::{Props, StepParams};
use crate::CoreError;

/// Options accepted by `FlowEngine::create_model`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateModelOptions {
    /// Registered model class name
    #[serde(rename = "use")]
    pub use_class: String,

    /// Stable identity; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Uid of the owning instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Initial props, merged over the class defaults
    #[serde(default)]
    pub props: Props,

    /// Persisted step params
    #[serde(default)]
    pub step_params: StepParams,

    /// Anything else; handed untouched to the init hooks
    #[serde(flatten)]
    pub extra: Props,
}

impl CreateModelOptions {
    /// Options for a model of class `use_class`
    pub fn new(use_class: impl Into<String>) -> Self {
        Self {
            use_class: use_class.into(),
            ..Default::default()
        }
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set the parent uid
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set a single initial prop
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Set persisted params for one step
    pub fn with_step_params(
        mut self,
        flow_key: impl Into<String>,
        step_key: impl Into<String>,
        params: Value,
    ) -> Self {
        self.step_params
            .entry(flow_key.into())
            .or_default()
            .insert(step_key.into(), params);
        self
    }
}

impl From<ModelRecord> for CreateModelOptions {
    fn from(record: ModelRecord) -> Self {
        Self {
            use_class: record.use_class,
            uid: Some(record.uid),
            parent_id: record.parent_id,
            props: record.props,
            step_params: record.step_params,
            extra: record.extra,
        }
    }
}

/// A live model instance.
///
/// The uid never changes after creation. Props are shared mutable state;
/// they are expected to change inside flow steps or through the setters here.
pub struct FlowModel {
    uid: String,
    use_class: String,
    class: Arc<ModelClass>,
    parent: RwLock<Option<Weak<FlowModel>>>,
    parent_id: RwLock<Option<String>>,
    props: watch::Sender<Props>,
    step_params: RwLock<StepParams>,
    extra: Props,
    engine: Weak<EngineInner>,
}

impl FlowModel {
    pub(crate) fn new(
        uid: String,
        class: Arc<ModelClass>,
        options: &CreateModelOptions,
        engine: Weak<EngineInner>,
    ) -> Self {
        let mut props = class.default_props();
        for (key, value) in &options.props {
            props.insert(key.clone(), value.clone());
        }
        let (props, _) = watch::channel(props);

        Self {
            uid,
            use_class: options.use_class.clone(),
            class,
            parent: RwLock::new(None),
            parent_id: RwLock::new(options.parent_id.clone()),
            props,
            step_params: RwLock::new(options.step_params.clone()),
            extra: options.extra.clone(),
            engine,
        }
    }

    /// Stable identity
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Name the model class was registered under
    pub fn use_class(&self) -> &str {
        &self.use_class
    }

    /// The model class
    pub fn model_class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    /// Owning instance, if it is still alive
    pub fn parent(&self) -> Option<Arc<FlowModel>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Uid of the owning instance, kept even after the parent is gone
    pub fn parent_id(&self) -> Option<String> {
        self.parent_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_parent(&self, parent: &Arc<FlowModel>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(parent));
        *self.parent_id.write().unwrap_or_else(PoisonError::into_inner) = Some(parent.uid.clone());
    }

    /// Snapshot of all props
    pub fn props(&self) -> Props {
        self.props.borrow().clone()
    }

    /// Read a single prop
    pub fn get_prop(&self, key: &str) -> Option<Value> {
        self.props.borrow().get(key).cloned()
    }

    /// Write a single prop and notify subscribers
    pub fn set_prop(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.props.send_modify(|props| {
            props.insert(key, value);
        });
    }

    /// Merge `props` into the current props and notify subscribers once
    pub fn set_props(&self, props: Props) {
        self.props.send_modify(|current| {
            for (key, value) in props {
                current.insert(key, value);
            }
        });
    }

    /// Observe props changes
    pub fn subscribe(&self) -> watch::Receiver<Props> {
        self.props.subscribe()
    }

    /// Persisted params of one step
    pub fn get_step_params(&self, flow_key: &str, step_key: &str) -> Option<Value> {
        self.step_params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(flow_key)
            .and_then(|steps| steps.get(step_key))
            .cloned()
    }

    /// Store params for one step; they apply to every later application
    pub fn set_step_params(&self, flow_key: impl Into<String>, step_key: impl Into<String>, params: Value) {
        self.step_params
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(flow_key.into())
            .or_default()
            .insert(step_key.into(), params);
    }

    /// All persisted step params
    pub fn step_params(&self) -> StepParams {
        self.step_params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Effective flows of this model's class
    pub fn flows(&self) -> Vec<FlowDefinition> {
        self.class.flows()
    }

    /// Serializable form stored by a `ModelRepository`
    pub fn to_record(&self) -> ModelRecord {
        ModelRecord {
            uid: self.uid.clone(),
            use_class: self.use_class.clone(),
            parent_id: self.parent_id(),
            props: self.props(),
            step_params: self.step_params(),
            extra: self.extra.clone(),
        }
    }

    /// The engine this model is bound to
    pub fn flow_engine(&self) -> Result<FlowEngine, CoreError> {
        self.engine
            .upgrade()
            .map(FlowEngine::from_inner)
            .ok_or_else(|| CoreError::EngineUnavailable(self.uid.clone()))
    }

    /// Persist through the engine's repository
    pub async fn save(&self) -> Result<(), CoreError> {
        self.flow_engine()?.save_model(self).await
    }

    /// Apply one of this model's flows through the engine
    pub async fn apply_flow(self: &Arc<Self>, flow_key: &str, params: Value) -> FlowOutcome {
        self.flow_engine()?.apply_flow(self, flow_key, params).await
    }

    /// Apply every auto flow through the engine
    pub async fn apply_auto_flows(self: &Arc<Self>, params: Value) -> Result<Props, CoreError> {
        self.flow_engine()?.apply_auto_flows(self, params).await
    }
}

impl fmt::Debug for FlowModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowModel")
            .field("uid", &self.uid)
            .field("use", &self.use_class)
            .field("parent_id", &self.parent_id())
            .field("props", &self.props())
            .finish()
    }
}
