//! Many callers, one execution per cache key

use flowmodel_core::{CacheStatus, CoreError, CreateModelOptions};
use flowmodel_integration_tests::utils::{widget_engine, AssignPropsAction};
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_of_identical_requests_runs_once() -> anyhow::Result<()> {
    let action = AssignPropsAction::with_delay(Duration::from_millis(100));
    let (engine, _provider, _repository) = widget_engine(action.clone());
    let widget = engine.create_model(CreateModelOptions::new("Widget").with_uid("w1"))?;

    let requests = (0..16).map(|_| {
        let widget = widget.clone();
        tokio::spawn(async move { widget.apply_flow("default", json!({"title": "Hello"})).await })
    });
    let outcomes = join_all(requests).await;

    for outcome in outcomes {
        assert_eq!(outcome?, Ok(json!({"assign": {"title": "Hello"}})));
    }
    assert_eq!(action.runs(), 1);
    assert_eq!(widget.get_prop("title"), Some(json!("Hello")));

    Ok(())
}

#[tokio::test]
async fn test_independent_keys_interleave() -> anyhow::Result<()> {
    let action = AssignPropsAction::with_delay(Duration::from_millis(20));
    let (engine, _provider, _repository) = widget_engine(action.clone());
    let a = engine.create_model(CreateModelOptions::new("Widget").with_uid("a"))?;
    let b = engine.create_model(CreateModelOptions::new("Widget").with_uid("b"))?;

    let params = json!({"title": "same"});
    let (ra, rb) = tokio::join!(
        a.apply_flow("default", params.clone()),
        b.apply_flow("default", params.clone()),
    );
    ra?;
    rb?;
    assert_eq!(action.runs(), 2);

    Ok(())
}

#[tokio::test]
async fn test_pending_entry_is_observable() -> anyhow::Result<()> {
    let action = AssignPropsAction::with_delay(Duration::from_millis(50));
    let (engine, _provider, _repository) = widget_engine(action);
    let widget = engine.create_model(CreateModelOptions::new("Widget").with_uid("w1"))?;

    let params = json!({"title": "x"});
    let key = flowmodel_core::cache_key("w1", "default", &params);
    let pending = tokio::spawn({
        let widget = widget.clone();
        let params = params.clone();
        async move { widget.apply_flow("default", params).await }
    });

    while engine.apply_flow_cache().status(&key).is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        engine.apply_flow_cache().status(&key),
        Some(CacheStatus::Pending)
    );

    pending.await??;
    assert!(engine.apply_flow_cache().status(&key).is_none());

    Ok(())
}

#[tokio::test]
async fn test_bad_params_reject_every_waiter() -> anyhow::Result<()> {
    let action = AssignPropsAction::with_delay(Duration::from_millis(20));
    let (engine, _provider, _repository) = widget_engine(action.clone());
    let widget = engine.create_model(CreateModelOptions::new("Widget"))?;

    let (a, b) = tokio::join!(
        widget.apply_flow("default", json!("not an object")),
        widget.apply_flow("default", json!("not an object")),
    );
    assert!(matches!(a, Err(CoreError::StepExecutionError(_))));
    assert_eq!(a, b);
    assert_eq!(action.runs(), 1);

    Ok(())
}
