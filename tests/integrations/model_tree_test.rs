//! Parent/child trees across memory and storage

use flowmodel_core::{CreateModelOptions, FlowDefinition, ModelRepository};
use flowmodel_integration_tests::utils::{widget_engine, AssignPropsAction};
use serde_json::json;

#[tokio::test]
async fn test_children_are_linked_and_persisted_with_parent_id() -> anyhow::Result<()> {
    let (engine, _provider, repository) = widget_engine(AssignPropsAction::default());

    let page = engine
        .load_or_create_model(CreateModelOptions::new("Page").with_uid("page"))
        .await?;
    for uid in ["a", "b"] {
        engine
            .load_or_create_model(
                CreateModelOptions::new("Widget")
                    .with_uid(uid)
                    .with_parent(page.uid()),
            )
            .await?;
    }

    let children: Vec<String> = engine
        .get_children("page")
        .iter()
        .map(|m| m.uid().to_string())
        .collect();
    assert_eq!(children, vec!["a", "b"]);
    assert_eq!(repository.find_children("page").await.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_page_class_rejects_flows() {
    let (engine, _provider, _repository) = widget_engine(AssignPropsAction::default());
    assert!(!engine.register_flow("Page", FlowDefinition::new("default")));
}

#[tokio::test]
async fn test_destroy_is_per_uid_unless_asked_to_cascade() -> anyhow::Result<()> {
    let (engine, _provider, repository) = widget_engine(AssignPropsAction::default());

    engine
        .load_or_create_model(CreateModelOptions::new("Page").with_uid("page"))
        .await?;
    let child = engine
        .load_or_create_model(
            CreateModelOptions::new("Widget")
                .with_uid("child")
                .with_parent("page"),
        )
        .await?;

    engine.destroy_model("page").await?;
    assert!(engine.get_model("child").is_some());
    assert!(child.parent().is_none());
    assert_eq!(child.parent_id().as_deref(), Some("page"));
    assert!(repository.load("child").await?.is_some());

    // rebuild the parent and cascade explicitly
    engine
        .load_or_create_model(CreateModelOptions::new("Page").with_uid("page"))
        .await?;
    engine
        .create_model(CreateModelOptions::new("Widget").with_uid("leaf").with_parent("page"))?;
    assert_eq!(engine.destroy_model_tree("page").await?, 2);
    assert!(engine.get_model("leaf").is_none());
    assert!(repository.load("page").await?.is_none());

    // the orphan survives: it was never linked to the rebuilt parent
    assert!(engine.get_model("child").is_some());
    assert_eq!(child.get_prop("visible"), Some(json!(true)));

    Ok(())
}
