//!
//! Flowmodel Core - flow orchestration runtime
//!
//! Registries for actions and model classes, model instances arranged in a
//! parent/child tree, flows attached to model classes, and a single-flight
//! cache that lets concurrent callers share one flow application.
//!
//! ```
//! use flowmodel_core::{
//!     step_fn, CreateModelOptions, FlowContext, FlowDefinition, FlowEngine, ModelClass,
//!     StepDefinition,
//! };
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flowmodel_core::CoreError> {
//! let engine = FlowEngine::new();
//! engine.register_model_class("Widget", ModelClass::new("Widget"));
//! engine.register_flow(
//!     "Widget",
//!     FlowDefinition::new("default").with_step(StepDefinition::inline(
//!         "setTitle",
//!         step_fn(|ctx: FlowContext, params: Value| async move {
//!             ctx.model().set_prop("title", params["title"].clone());
//!             Ok(Value::Null)
//!         }),
//!     )),
//! );
//!
//! let widget = engine.create_model(CreateModelOptions::new("Widget").with_uid("w1"))?;
//! widget.apply_flow("default", json!({"title": "Hello"})).await?;
//! assert_eq!(widget.get_prop("title"), Some(json!("Hello")));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - models, classes, flows, steps and the repository contract
pub mod domain;

/// Application services - registries, flow execution, cache and engine facade
pub mod application;

/// Engine configuration
pub mod config;

/// Shared aliases and parameter helpers
pub mod types;

/// Error types
pub mod error;

// Re-export main API types for easy use
pub use application::apply_flow_cache::{cache_key, ApplyFlowCache, CacheEntry, CacheStatus, FlowOutcome};
pub use application::flow_engine::FlowEngine;
pub use config::{CacheConfig, EngineConfig, EvictionPolicy};
pub use domain::action::{ActionDefinition, ActionOptions, ActionRegistration};
pub use domain::context::FlowContext;
pub use domain::flow_definition::FlowDefinition;
pub use domain::model::{CreateModelOptions, FlowModel};
pub use domain::model_class::{InitHook, ModelClass};
pub use domain::repository::{ModelRecord, ModelRepository};
pub use domain::step::{step_fn, FnHandler, StepDefinition, StepHandler, StepKind};
pub use error::CoreError;
pub use types::{Props, StepParams};
