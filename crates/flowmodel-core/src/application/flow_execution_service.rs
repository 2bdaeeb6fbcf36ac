use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::apply_flow_cache::FlowOutcome;
use crate::application::flow_engine::FlowEngine;
use crate::domain::context::FlowContext;
use crate::domain::flow_definition::FlowDefinition;
use crate::domain::model::FlowModel;
use crate::domain::step::{StepDefinition, StepHandler, StepKind};
use crate::types::merge_params;
use crate::CoreError;

/// Executes the steps of one flow application in order
pub struct FlowExecutionService {
    engine: FlowEngine,
}

impl FlowExecutionService {
    /// Create a service bound to `engine`
    pub fn new(engine: FlowEngine) -> Self {
        Self { engine }
    }

    /// Run every step of `flow` against `model`.
    ///
    /// Step N starts only after step N-1 finished. The first failing step
    /// rejects the whole application. Resolves to an object of step results
    /// keyed by step key.
    pub async fn execute(
        &self,
        model: Arc<FlowModel>,
        flow: FlowDefinition,
        params: Value,
    ) -> FlowOutcome {
        let ctx = FlowContext::new(self.engine.clone(), model.clone(), flow.key.clone(), params.clone());
        debug!(
            uid = %model.uid(),
            flow_key = %flow.key,
            steps = flow.steps().len(),
            "Applying flow"
        );

        for step in flow.steps() {
            let (handler, action_defaults) = self.resolve(step)?;
            let stored = model.get_step_params(&flow.key, &step.key);
            let step_params = merge_params([
                action_defaults.as_ref(),
                step.default_params.as_ref(),
                stored.as_ref(),
                Some(&params),
            ]);

            let result = handler.handle(ctx.clone(), step_params).await.map_err(|e| {
                warn!(
                    uid = %model.uid(),
                    flow_key = %flow.key,
                    step_key = %step.key,
                    error = %e,
                    "Step failed"
                );
                e
            })?;
            ctx.record_step_result(&step.key, result);

            if ctx.is_exited() {
                debug!(
                    uid = %model.uid(),
                    flow_key = %flow.key,
                    step_key = %step.key,
                    "Flow exited early"
                );
                break;
            }
        }

        debug!(uid = %model.uid(), flow_key = %flow.key, "Flow applied");
        Ok(Value::Object(ctx.step_results()))
    }

    /// Resolve the handler of a step; actions are looked up at execution time
    fn resolve(&self, step: &StepDefinition) -> Result<(Arc<dyn StepHandler>, Option<Value>), CoreError> {
        match &step.kind {
            StepKind::Inline(handler) => Ok((handler.clone(), None)),
            StepKind::Action(name) => {
                let action = self
                    .engine
                    .get_action(name)
                    .ok_or_else(|| CoreError::ActionNotFound(name.clone()))?;
                Ok((action.handler, action.default_params))
            }
        }
    }
}
