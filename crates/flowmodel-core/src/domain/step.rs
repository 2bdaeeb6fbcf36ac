use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::domain::context::FlowContext;
use crate::CoreError;

/// Executable unit behind a flow step or a registered action.
///
/// Handlers receive a clone of the application's [`FlowContext`] and the
/// merged parameters for the step. The returned value is recorded as the
/// step's result and is visible to every later step of the same application.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Run the step
    async fn handle(&self, ctx: FlowContext, params: Value) -> Result<Value, CoreError>;
}

/// Handler built from an async closure, see [`step_fn`]
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`StepHandler`]
///
/// ```
/// use flowmodel_core::{step_fn, FlowContext};
/// use serde_json::{json, Value};
///
/// let handler = step_fn(|ctx: FlowContext, params: Value| async move {
///     ctx.model().set_prop("title", params["title"].clone());
///     Ok(json!(null))
/// });
/// # let _ = handler;
/// ```
pub fn step_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(FlowContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CoreError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> StepHandler for FnHandler<F>
where
    F: Fn(FlowContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CoreError>> + Send + 'static,
{
    async fn handle(&self, ctx: FlowContext, params: Value) -> Result<Value, CoreError> {
        (self.f)(ctx, params).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// What a step runs: its own handler or a registered action looked up at apply-time
#[derive(Clone)]
pub enum StepKind {
    /// Handler embedded in the step
    Inline(Arc<dyn StepHandler>),
    /// Name of an action in the engine's action registry
    Action(String),
}

impl fmt::Debug for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Inline(_) => f.write_str("Inline(..)"),
            StepKind::Action(name) => f.debug_tuple("Action").field(name).finish(),
        }
    }
}

/// One step of a flow
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// Key of the step, unique within its flow
    pub key: String,

    /// Human-readable title
    pub title: Option<String>,

    /// Schema for an externally rendered configuration form; never interpreted here
    pub ui_schema: Option<Value>,

    /// Parameters merged under the model's stored params and the invocation params
    pub default_params: Option<Value>,

    /// Handler resolution
    pub kind: StepKind,
}

impl StepDefinition {
    /// Step running an inline handler
    pub fn inline(key: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        Self::with_kind(key, StepKind::Inline(Arc::new(handler)))
    }

    /// Step delegating to a registered action
    pub fn action(key: impl Into<String>, action_name: impl Into<String>) -> Self {
        Self::with_kind(key, StepKind::Action(action_name.into()))
    }

    fn with_kind(key: impl Into<String>, kind: StepKind) -> Self {
        Self {
            key: key.into(),
            title: None,
            ui_schema: None,
            default_params: None,
            kind,
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

    /// Name of the referenced action, if any
    pub fn action_name(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Action(name) => Some(name),
            StepKind::Inline(_) => None,
        }
    }
}
