use anyhow::Context;
use flowmodel_core::{
    step_fn, CreateModelOptions, EngineConfig, FlowContext, FlowDefinition, FlowEngine,
    ModelClass, StepDefinition,
};
use flowmodel_monitoring::{init_logging, LogExt, MonitoringConfig};
use flowmodel_state_inmemory::InMemoryStateStoreProvider;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Outcome of the widget walkthrough
#[derive(Debug)]
struct ScenarioReport {
    title: Option<Value>,
    step_runs: usize,
    stored_records: usize,
}

fn register_widget(engine: &FlowEngine, step_runs: Arc<AtomicUsize>) {
    engine.register_model_class("Widget", ModelClass::new("Widget"));
    engine.register_flow(
        "Widget",
        FlowDefinition::new("default").with_step(
            StepDefinition::inline(
                "setTitle",
                step_fn(move |ctx: FlowContext, params: Value| {
                    let step_runs = step_runs.clone();
                    async move {
                        step_runs.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        ctx.model().set_prop("title", params["title"].clone());
                        Ok(params["title"].clone())
                    }
                }),
            )
            .with_title("Set title"),
        ),
    );
}

async fn run_widget_scenario(engine: &FlowEngine, provider: &InMemoryStateStoreProvider) -> anyhow::Result<ScenarioReport> {
    let step_runs = Arc::new(AtomicUsize::new(0));
    register_widget(engine, step_runs.clone());

    let widget = engine
        .load_or_create_model(CreateModelOptions::new("Widget").with_uid("w1"))
        .await
        .context("Failed to create widget")?;

    let params = json!({"title": "Hello"});
    let (first, second) = tokio::join!(
        widget.apply_flow("default", params.clone()),
        widget.apply_flow("default", params.clone()),
    );
    let first = first.log_err("First application failed")?;
    let second = second.log_err("Second application failed")?;
    info!(first = %first, second = %second, "Both callers settled");

    widget.save().await.log_ok("Widget saved")?;

    Ok(ScenarioReport {
        title: widget.get_prop("title"),
        step_runs: step_runs.load(Ordering::SeqCst),
        stored_records: provider.len().await,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let monitoring = MonitoringConfig::from_env();
    init_logging(&monitoring)?;

    let engine = FlowEngine::with_config(EngineConfig::from_env());
    let provider = InMemoryStateStoreProvider::new();
    provider.attach(&engine);

    let report = run_widget_scenario(&engine, &provider).await?;
    info!(
        title = ?report.title,
        step_runs = report.step_runs,
        stored_records = report.stored_records,
        "Widget scenario finished"
    );

    Ok(())
}
