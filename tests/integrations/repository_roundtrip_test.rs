//! Persist models through the in-memory store and bring them back

use flowmodel_core::{CreateModelOptions, FlowEngine, ModelRepository};
use flowmodel_integration_tests::utils::{widget_engine, AssignPropsAction};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_flow_results_survive_a_new_engine() -> anyhow::Result<()> {
    let (engine, provider, repository) = widget_engine(AssignPropsAction::default());

    let widget = engine
        .load_or_create_model(CreateModelOptions::new("Widget").with_uid("w1"))
        .await?;
    assert_eq!(widget.get_prop("visible"), Some(json!(true)));

    widget.apply_flow("default", json!({"title": "Hello"})).await?;
    widget.save().await?;
    assert_eq!(repository.stored("w1").await.map(|s| s.revision), Some(2));

    // a second engine sharing the same storage sees the saved props
    let (other, _, _) = widget_engine(AssignPropsAction::default());
    other.set_model_repository(provider.create_repository());
    let loaded = other.load_model("w1").await?.expect("record should exist");
    assert_eq!(loaded.get_prop("title"), Some(json!("Hello")));
    assert!(!Arc::ptr_eq(&loaded, &widget));

    Ok(())
}

#[tokio::test]
async fn test_destroy_removes_memory_and_storage() -> anyhow::Result<()> {
    let (engine, provider, repository) = widget_engine(AssignPropsAction::default());

    engine
        .load_or_create_model(CreateModelOptions::new("Widget").with_uid("w1"))
        .await?;
    assert_eq!(provider.len().await, 1);

    assert!(engine.destroy_model("w1").await?);
    assert!(engine.get_model("w1").is_none());
    assert!(repository.load("w1").await?.is_none());
    assert!(provider.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_engine_without_store_stays_in_memory() -> anyhow::Result<()> {
    let engine = FlowEngine::new();
    engine.register_model_class("Widget", flowmodel_core::ModelClass::new("Widget"));

    assert!(engine.load_model("w1").await?.is_none());
    let model = engine
        .load_or_create_model(CreateModelOptions::new("Widget").with_uid("w1"))
        .await?;
    model.save().await?;
    assert!(engine.destroy_model("w1").await?);

    Ok(())
}
