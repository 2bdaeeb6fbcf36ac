//! Execution context threaded through the steps of one flow application

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::application::flow_engine::FlowEngine;
use crate::domain::model::FlowModel;
use crate::types::Props;

/// Context handed to every step handler of a flow application.
///
/// Cloning is cheap; all clones of one application share the accumulated
/// step results and the exit flag.
#[derive(Clone)]
pub struct FlowContext {
    engine: FlowEngine,
    model: Arc<FlowModel>,
    flow_key: String,
    params: Value,
    step_results: Arc<Mutex<Map<String, Value>>>,
    exited: Arc<AtomicBool>,
}

impl FlowContext {
    pub(crate) fn new(
        engine: FlowEngine,
        model: Arc<FlowModel>,
        flow_key: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            engine,
            model,
            flow_key: flow_key.into(),
            params,
            step_results: Arc::new(Mutex::new(Map::new())),
            exited: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The model the flow is applied to
    pub fn model(&self) -> &Arc<FlowModel> {
        &self.model
    }

    /// The owning engine
    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    /// Key of the flow being applied
    pub fn flow_key(&self) -> &str {
        &self.flow_key
    }

    /// Parameters the flow application was invoked with
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Snapshot of the engine-wide context bag
    pub fn shared_context(&self) -> Props {
        self.engine.get_context()
    }

    /// Result recorded by an earlier step of this application
    pub fn step_result(&self, step_key: &str) -> Option<Value> {
        self.step_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(step_key)
            .cloned()
    }

    /// All step results recorded so far, keyed by step
    pub fn step_results(&self) -> Map<String, Value> {
        self.step_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_step_result(&self, step_key: &str, result: Value) {
        self.step_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(step_key.to_string(), result);
    }

    /// Stop the application after the current step
    pub fn exit(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    /// Whether a step asked to stop
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("uid", &self.model.uid())
            .field("flow_key", &self.flow_key)
            .field("params", &self.params)
            .field("exited", &self.is_exited())
            .finish()
    }
}
