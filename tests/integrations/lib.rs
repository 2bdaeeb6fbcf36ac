// Flowmodel Integration Tests
//
// Cross-crate tests: the core engine persisting through the in-memory store.

/// Shared test infrastructure for integration tests
pub mod utils {
    use async_trait::async_trait;
    use flowmodel_core::{
        ActionOptions, CoreError, FlowContext, FlowDefinition, FlowEngine, ModelClass,
        StepDefinition, StepHandler,
    };
    use flowmodel_state_inmemory::{InMemoryModelRepository, InMemoryStateStoreProvider};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Action that copies its params into the model's props and counts its runs
    #[derive(Default, Clone)]
    pub struct AssignPropsAction {
        /// Number of executions so far
        pub runs: Arc<AtomicUsize>,
        /// Artificial latency, to keep an application pending
        pub delay: Duration,
    }

    impl AssignPropsAction {
        /// Action with a fixed latency
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        /// Number of executions so far
        pub fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StepHandler for AssignPropsAction {
        async fn handle(&self, ctx: FlowContext, params: Value) -> Result<Value, CoreError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let Value::Object(props) = params else {
                return Err(CoreError::StepExecutionError(
                    "assignProps expects an object".to_string(),
                ));
            };
            ctx.model().set_props(props.clone());
            Ok(Value::Object(props))
        }
    }

    /// Engine with `Page` and `Widget` classes, an `assignProps` action and a
    /// `default` flow on `Widget`, persisting into a fresh in-memory store
    pub fn widget_engine(
        action: AssignPropsAction,
    ) -> (FlowEngine, InMemoryStateStoreProvider, Arc<InMemoryModelRepository>) {
        let engine = FlowEngine::new();
        engine.register_model_class("Page", ModelClass::new("Page").without_flows());
        engine.register_model_class(
            "Widget",
            ModelClass::new("Widget").with_default_props(
                json!({"visible": true}).as_object().cloned().unwrap_or_default(),
            ),
        );
        engine
            .register_action((
                "assignProps",
                ActionOptions::new(action).with_title("Assign props"),
            ))
            .expect("action registration");
        engine.register_flow(
            "Widget",
            FlowDefinition::new("default")
                .with_step(StepDefinition::action("assign", "assignProps")),
        );

        let provider = InMemoryStateStoreProvider::new();
        let repository = provider.attach(&engine);
        (engine, provider, repository)
    }
}
