//! Engine facade
//!
//! [`FlowEngine`] is the single entry point: it owns the action and model
//! class registries, the live model instances, the shared context bag, the
//! optional model repository and the apply-flow cache. Every engine is an
//! isolated unit; nothing is process-global.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::action_registry::ActionRegistry;
use crate::application::apply_flow_cache::{cache_key, ApplyFlowCache, FlowOutcome};
use crate::application::flow_execution_service::FlowExecutionService;
use crate::application::model_class_registry::ModelClassRegistry;
use crate::application::model_instance_registry::ModelInstanceRegistry;
use crate::config::EngineConfig;
use crate::domain::action::{ActionDefinition, ActionRegistration};
use crate::domain::flow_definition::FlowDefinition;
use crate::domain::model::{CreateModelOptions, FlowModel};
use crate::domain::model_class::ModelClass;
use crate::domain::repository::ModelRepository;
use crate::types::Props;
use crate::CoreError;

/// State shared by every handle of one engine
pub struct EngineInner {
    actions: ActionRegistry,
    model_classes: ModelClassRegistry,
    models: ModelInstanceRegistry,
    cache: ApplyFlowCache,
    context: RwLock<Props>,
    repository: RwLock<Option<Arc<dyn ModelRepository>>>,
    config: EngineConfig,
}

/// Cloneable handle to a flow engine
#[derive(Clone)]
pub struct FlowEngine {
    inner: Arc<EngineInner>,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowEngine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with `config`
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                actions: ActionRegistry::new(),
                model_classes: ModelClassRegistry::new(),
                models: ModelInstanceRegistry::new(),
                cache: ApplyFlowCache::new(config.cache.clone()),
                context: RwLock::new(Props::new()),
                repository: RwLock::new(None),
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // -- repository ------------------------------------------------------

    /// Configure the persistence backend, replacing any previous one
    pub fn set_model_repository(&self, repository: Arc<dyn ModelRepository>) {
        let mut slot = self
            .inner
            .repository
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("Model repository is already set and will be overwritten");
        }
        *slot = Some(repository);
    }

    /// The configured persistence backend
    pub fn model_repository(&self) -> Option<Arc<dyn ModelRepository>> {
        self.inner
            .repository
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // -- shared context --------------------------------------------------

    /// Replace the shared context bag
    pub fn set_context(&self, context: Props) {
        *self
            .inner
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner) = context;
    }

    /// Snapshot of the shared context bag
    pub fn get_context(&self) -> Props {
        self.inner
            .context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set one key of the shared context bag
    pub fn set_context_value(&self, key: impl Into<String>, value: Value) {
        self.inner
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    // -- actions ---------------------------------------------------------

    /// Register an action from `(name, ActionOptions)` or an [`ActionDefinition`]
    pub fn register_action(&self, registration: impl Into<ActionRegistration>) -> Result<(), CoreError> {
        self.inner.actions.register(registration)
    }

    /// Look up an action
    pub fn get_action(&self, name: &str) -> Option<ActionDefinition> {
        self.inner.actions.get(name)
    }

    // -- model classes ---------------------------------------------------

    /// Register a model class under `name`
    pub fn register_model_class(&self, name: impl Into<String>, class: impl Into<Arc<ModelClass>>) {
        self.inner.model_classes.register(name, class.into());
    }

    /// Register several model classes
    pub fn register_models<I, S>(&self, classes: I)
    where
        I: IntoIterator<Item = (S, Arc<ModelClass>)>,
        S: Into<String>,
    {
        self.inner.model_classes.register_all(classes);
    }

    /// Look up a model class
    pub fn get_model_class(&self, name: &str) -> Option<Arc<ModelClass>> {
        self.inner.model_classes.get(name)
    }

    /// Snapshot of every registered model class
    pub fn get_model_classes(&self) -> HashMap<String, Arc<ModelClass>> {
        self.inner.model_classes.snapshot()
    }

    // -- flows -----------------------------------------------------------

    /// Attach a flow to a registered model class.
    ///
    /// Unknown classes, classes built without flows and malformed flows are
    /// logged and ignored. Returns whether the flow was stored.
    pub fn register_flow(&self, model_class: &str, flow: FlowDefinition) -> bool {
        let flow_key = flow.key.clone();

        let Some(class) = self.get_model_class(model_class) else {
            warn!(
                model_class = %model_class,
                flow_key = %flow_key,
                "Model class not found, flow will not be registered"
            );
            return false;
        };

        if let Err(e) = flow.validate() {
            warn!(
                model_class = %model_class,
                flow_key = %flow_key,
                error = %e,
                "Invalid flow definition, flow will not be registered"
            );
            return false;
        }

        if !class.register_flow(flow) {
            warn!(
                model_class = %model_class,
                flow_key = %flow_key,
                "Model class does not accept flows, flow will not be registered"
            );
            return false;
        }

        debug!(model_class = %model_class, flow_key = %flow_key, "Registered flow");
        true
    }

    // -- model instances -------------------------------------------------

    /// Create a model instance, or return the live one with the same uid.
    ///
    /// Init hooks run once, only for a newly created instance. A failing hook
    /// unregisters the instance and fails the call.
    pub fn create_model(&self, options: CreateModelOptions) -> Result<Arc<FlowModel>, CoreError> {
        let class = self
            .get_model_class(&options.use_class)
            .ok_or_else(|| CoreError::ModelClassNotFound(options.use_class.clone()))?;

        if let Some(existing) = options.uid.as_deref().and_then(|uid| self.inner.models.get(uid)) {
            debug!(uid = %existing.uid(), "Model already exists, returning live instance");
            return Ok(existing);
        }

        let uid = options
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let model = Arc::new(FlowModel::new(
            uid,
            class.clone(),
            &options,
            Arc::downgrade(&self.inner),
        ));

        let (model, inserted) = self.inner.models.insert_or_existing(model);
        if !inserted {
            return Ok(model);
        }

        if let Some(parent_id) = options.parent_id.as_deref().filter(|id| *id != model.uid()) {
            match self.inner.models.get(parent_id) {
                Some(parent) => {
                    model.set_parent(&parent);
                    self.inner.models.link_child(parent_id, model.uid());
                }
                None => debug!(
                    uid = %model.uid(),
                    parent_id = %parent_id,
                    "Parent is not live, model is left unlinked"
                ),
            }
        }

        for hook in class.init_hooks() {
            if let Err(e) = hook(model.as_ref(), &options) {
                warn!(uid = %model.uid(), error = %e, "Model initialization failed");
                self.inner.models.remove(model.uid());
                return Err(e);
            }
        }

        debug!(uid = %model.uid(), model_class = %options.use_class, "Created model");
        Ok(model)
    }

    /// Look up a live instance
    pub fn get_model(&self, uid: &str) -> Option<Arc<FlowModel>> {
        self.inner.models.get(uid)
    }

    /// Live direct children of `uid`, in link order
    pub fn get_children(&self, uid: &str) -> Vec<Arc<FlowModel>> {
        self.inner
            .models
            .children(uid)
            .iter()
            .filter_map(|child| self.inner.models.get(child))
            .collect()
    }

    /// Unregister one instance; its children stay registered.
    ///
    /// Returns `true` iff an instance was removed.
    pub fn remove_model(&self, uid: &str) -> bool {
        let removed = self.inner.models.remove(uid).is_some();
        if removed {
            debug!(uid = %uid, "Removed model");
        }
        removed
    }

    /// Unregister an instance and everything below it; returns how many were removed
    pub fn remove_model_tree(&self, uid: &str) -> usize {
        let mut uids = self.inner.models.descendants(uid);
        uids.push(uid.to_string());
        uids.iter().filter(|uid| self.remove_model(uid)).count()
    }

    /// Load an instance through the repository.
    ///
    /// `Ok(None)` when no repository is configured or no record exists.
    pub async fn load_model(&self, uid: &str) -> Result<Option<Arc<FlowModel>>, CoreError> {
        let Some(repository) = self.model_repository() else {
            debug!(uid = %uid, "No model repository configured, nothing to load");
            return Ok(None);
        };

        match repository.load(uid).await? {
            Some(record) if !record.uid.is_empty() => {
                debug!(uid = %uid, "Loaded model record");
                self.create_model(record.into()).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Load the instance named by `options.uid`, or create and persist a new one.
    ///
    /// Without a repository the instance is created in memory only. If the
    /// first save fails the new instance is unregistered again.
    pub async fn load_or_create_model(
        &self,
        options: CreateModelOptions,
    ) -> Result<Arc<FlowModel>, CoreError> {
        let Some(repository) = self.model_repository() else {
            return self.create_model(options);
        };

        if let Some(uid) = options.uid.as_deref().filter(|uid| !uid.is_empty()) {
            if let Some(record) = repository.load(uid).await? {
                if !record.uid.is_empty() {
                    return self.create_model(record.into());
                }
            }
        }

        let model = self.create_model(options)?;
        if let Err(e) = repository.save(&model).await {
            warn!(uid = %model.uid(), error = %e, "Failed to persist new model");
            self.remove_model(model.uid());
            return Err(e);
        }
        Ok(model)
    }

    /// Persist an instance; a no-op without a repository
    pub async fn save_model(&self, model: &FlowModel) -> Result<(), CoreError> {
        match self.model_repository() {
            Some(repository) => {
                repository.save(model).await?;
                debug!(uid = %model.uid(), "Saved model");
                Ok(())
            }
            None => {
                debug!(uid = %model.uid(), "No model repository configured, save skipped");
                Ok(())
            }
        }
    }

    /// Delete an instance from the repository and from memory.
    ///
    /// The in-memory instance is removed even when the repository fails; the
    /// repository error is returned afterwards. Resolves to whether a live
    /// instance was removed.
    pub async fn destroy_model(&self, uid: &str) -> Result<bool, CoreError> {
        let persisted = match self.model_repository() {
            Some(repository) => repository.destroy(uid).await,
            None => Ok(()),
        };

        let removed = self.remove_model(uid);
        if let Err(e) = persisted {
            warn!(uid = %uid, error = %e, "Failed to destroy persisted model");
            return Err(e);
        }
        debug!(uid = %uid, removed, "Destroyed model");
        Ok(removed)
    }

    /// Destroy an instance and everything below it, deepest first.
    ///
    /// Every uid is attempted; the first repository error is returned.
    pub async fn destroy_model_tree(&self, uid: &str) -> Result<usize, CoreError> {
        let mut uids = self.inner.models.descendants(uid);
        uids.push(uid.to_string());

        let mut removed = 0;
        let mut first_error = None;
        for uid in &uids {
            match self.destroy_model(uid).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    removed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    // -- flow application ------------------------------------------------

    /// Apply a flow of the model's class.
    ///
    /// Concurrent applications with the same uid, flow key and params share
    /// one execution.
    pub async fn apply_flow(
        &self,
        model: &Arc<FlowModel>,
        flow_key: &str,
        params: Value,
    ) -> FlowOutcome {
        let flow = model.model_class().get_flow(flow_key).ok_or_else(|| {
            CoreError::FlowNotFound(format!("{}.{}", model.use_class(), flow_key))
        })?;

        let key = cache_key(model.uid(), flow_key, &params);
        let service = FlowExecutionService::new(self.clone());
        let model = model.clone();

        self.inner
            .cache
            .run(key, move || async move { service.execute(model, flow, params).await })
            .await
    }

    /// Apply every auto flow of the model's class in order.
    ///
    /// Resolves to the outcome of each flow keyed by flow key; stops at the
    /// first failing flow.
    pub async fn apply_auto_flows(
        &self,
        model: &Arc<FlowModel>,
        params: Value,
    ) -> Result<Props, CoreError> {
        let mut results = Props::new();
        for flow in model.model_class().auto_flows() {
            let outcome = self.apply_flow(model, &flow.key, params.clone()).await?;
            results.insert(flow.key, outcome);
        }
        Ok(results)
    }

    /// The apply-flow cache, for inspection and invalidation
    pub fn apply_flow_cache(&self) -> &ApplyFlowCache {
        &self.inner.cache
    }
}

impl fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowEngine")
            .field("actions", &self.inner.actions.len())
            .field("model_classes", &self.inner.model_classes.len())
            .field("models", &self.inner.models.len())
            .field("has_repository", &self.model_repository().is_some())
            .field("cache", &self.inner.cache)
            .finish()
    }
}
