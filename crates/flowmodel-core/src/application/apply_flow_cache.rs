//! Single-flight cache for flow applications
//!
//! The first request for a cache key spawns the execution and installs a
//! shared handle to its outcome. Every request for the same key that arrives
//! before the entry is evicted awaits that handle instead of running the flow
//! again. Executions are spawned, so they run to completion even if every
//! caller stops waiting.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::{CacheConfig, EvictionPolicy};
use crate::types::params_fingerprint;
use crate::CoreError;

/// Outcome of one flow application
pub type FlowOutcome = Result<Value, CoreError>;

type SharedOutcome = Shared<BoxFuture<'static, FlowOutcome>>;

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Execution in flight
    Pending,
    /// Execution finished with a value
    Resolved,
    /// Execution failed
    Rejected,
}

/// Snapshot of a cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Current status
    pub status: CacheStatus,
    /// Value, once resolved
    pub data: Option<Value>,
    /// Failure, once rejected
    pub error: Option<CoreError>,
}

struct Slot {
    id: u64,
    status: CacheStatus,
    outcome: SharedOutcome,
    data: Option<Value>,
    error: Option<CoreError>,
    settled_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, config: &CacheConfig) -> bool {
        self.settled_at
            .is_some_and(|at| at.elapsed() >= config.retain_for())
    }

    fn snapshot(&self) -> CacheEntry {
        CacheEntry {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

/// Compute the cache key of a flow application.
///
/// Uid and flow key are length-prefixed, so separators inside either one
/// cannot make two different (uid, flow key) pairs share a key.
pub fn cache_key(uid: &str, flow_key: &str, params: &Value) -> String {
    format!(
        "{}:{}|{}:{}|{}",
        uid.len(),
        uid,
        flow_key.len(),
        flow_key,
        params_fingerprint(params)
    )
}

/// Deduplicating cache of in-flight and recently settled flow applications
#[derive(Clone)]
pub struct ApplyFlowCache {
    slots: Arc<DashMap<String, Slot>>,
    next_id: Arc<AtomicU64>,
    config: CacheConfig,
}

impl ApplyFlowCache {
    /// Create an empty cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Run `make()` under `key`, or join the execution already registered for it.
    ///
    /// `make` is only called when no live entry exists for `key`.
    pub async fn run<F, Fut>(&self, key: String, make: F) -> FlowOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlowOutcome> + Send + 'static,
    {
        let outcome = match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(&self.config) {
                    debug!(cache_key = %key, "Cache entry expired, executing again");
                    let slot = self.start(key.clone(), make());
                    let outcome = slot.outcome.clone();
                    occupied.insert(slot);
                    outcome
                } else {
                    debug!(
                        cache_key = %key,
                        status = ?occupied.get().status,
                        "Joining existing flow application"
                    );
                    occupied.get().outcome.clone()
                }
            }
            Entry::Vacant(vacant) => {
                let slot = self.start(key.clone(), make());
                let outcome = slot.outcome.clone();
                vacant.insert(slot);
                outcome
            }
        };

        outcome.await
    }

    fn start<Fut>(&self, key: String, execution: Fut) -> Slot
    where
        Fut: Future<Output = FlowOutcome> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slots = self.slots.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(execution).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(cache_key = %key, "Flow application panicked");
                    Err(CoreError::FlowExecutionError(format!(
                        "flow application '{}' panicked",
                        key
                    )))
                }
            };
            settle(&slots, &key, id, &outcome, &config);
            outcome
        });

        let outcome = async move {
            handle.await.unwrap_or_else(|e| {
                Err(CoreError::FlowExecutionError(format!(
                    "flow application task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared();

        Slot {
            id,
            status: CacheStatus::Pending,
            outcome,
            data: None,
            error: None,
            settled_at: None,
        }
    }

    /// Status of the live entry for `key`
    pub fn status(&self, key: &str) -> Option<CacheStatus> {
        self.entry(key).map(|entry| entry.status)
    }

    /// Snapshot of the live entry for `key`
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.slots
            .get(key)
            .filter(|slot| !slot.is_expired(&self.config))
            .map(|slot| slot.snapshot())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.slots.len()
    }

    /// Whether there is no live entry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the settled entry for `key`.
    ///
    /// A pending entry is left in place so its execution stays the only one
    /// for `key`; returns whether an entry was dropped.
    pub fn invalidate(&self, key: &str) -> bool {
        self.slots
            .remove_if(key, |_, slot| slot.status != CacheStatus::Pending)
            .is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.slots.clear();
    }

    fn purge_expired(&self) {
        let config = &self.config;
        self.slots.retain(|_, slot| !slot.is_expired(config));
    }
}

impl std::fmt::Debug for ApplyFlowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyFlowCache")
            .field("entries", &self.slots.len())
            .field("config", &self.config)
            .finish()
    }
}

fn settle(
    slots: &DashMap<String, Slot>,
    key: &str,
    id: u64,
    outcome: &FlowOutcome,
    config: &CacheConfig,
) {
    match config.eviction {
        EvictionPolicy::OnSettle => {
            slots.remove_if(key, |_, slot| slot.id == id);
        }
        EvictionPolicy::Retain => {
            if let Some(mut slot) = slots.get_mut(key) {
                if slot.id != id {
                    return;
                }
                match outcome {
                    Ok(value) => {
                        slot.status = CacheStatus::Resolved;
                        slot.data = Some(value.clone());
                    }
                    Err(error) => {
                        slot.status = CacheStatus::Rejected;
                        slot.error = Some(error.clone());
                    }
                }
                slot.settled_at = Some(Instant::now());
            }
        }
    }

    match outcome {
        Ok(_) => debug!(cache_key = %key, "Flow application resolved"),
        Err(error) => debug!(cache_key = %key, error = %error, "Flow application rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn retain(retain_ms: u64) -> CacheConfig {
        CacheConfig {
            eviction: EvictionPolicy::Retain,
            retain_ms,
        }
    }

    async fn wait_for_pending(cache: &ApplyFlowCache, key: &str) {
        while cache.status(key) != Some(CacheStatus::Pending) {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_cache_key_ignores_param_key_order() {
        let a = cache_key("w1", "default", &json!({"a": 1, "b": 2}));
        let b = cache_key("w1", "default", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
        assert!(a.starts_with("2:w1|7:default|"));
        assert_ne!(a, cache_key("w1", "default", &json!({"a": 2, "b": 2})));
        assert_ne!(a, cache_key("w2", "default", &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_cache_key_separators_in_uid_and_flow_key() {
        assert_ne!(
            cache_key("a:b", "c", &Value::Null),
            cache_key("a", "b:c", &Value::Null)
        );
        assert_ne!(
            cache_key("a|1:b", "c", &Value::Null),
            cache_key("a", "b|1:c", &Value::Null)
        );
    }

    #[tokio::test]
    async fn test_invalidate_keeps_pending_entry() {
        let cache = ApplyFlowCache::new(CacheConfig::default());
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = tokio::spawn({
            let cache = cache.clone();
            let runs = runs.clone();
            async move {
                cache
                    .run("k".to_string(), move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        Ok(json!(1))
                    })
                    .await
            }
        });
        wait_for_pending(&cache, "k").await;

        assert!(!cache.invalidate("k"));
        assert_eq!(cache.status("k"), Some(CacheStatus::Pending));

        let second_runs = runs.clone();
        let (second, _) = tokio::join!(
            cache.run("k".to_string(), move || async move {
                second_runs.fetch_add(1, Ordering::SeqCst);
                Ok(json!(2))
            }),
            async move { release.send(()).unwrap() },
        );

        assert_eq!(first.await.unwrap(), Ok(json!(1)));
        assert_eq!(second, Ok(json!(1)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_execution() {
        let cache = ApplyFlowCache::new(CacheConfig::default());
        let executions = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            let executions = executions.clone();
            tokio::spawn(async move {
                cache
                    .run("k".to_string(), move || async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        Ok(json!("done"))
                    })
                    .await
            })
        };

        wait_for_pending(&cache, "k").await;

        let second = {
            let cache = cache.clone();
            let executions = executions.clone();
            tokio::spawn(async move {
                cache
                    .run("k".to_string(), move || async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok(json!("duplicate"))
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        release.send(()).unwrap();

        assert_eq!(first.await.unwrap(), Ok(json!("done")));
        assert_eq!(second.await.unwrap(), Ok(json!("done")));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty(), "on_settle evicts after settlement");
    }

    #[tokio::test]
    async fn test_rejection_reaches_every_waiter() {
        let cache = ApplyFlowCache::new(CacheConfig::default());
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .run("k".to_string(), move || async move {
                        let _ = gate.await;
                        Err(CoreError::StepExecutionError("boom".to_string()))
                    })
                    .await
            })
        };
        wait_for_pending(&cache, "k").await;

        let second = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .run("k".to_string(), || async { Ok(Value::Null) })
                    .await
            })
        };
        tokio::task::yield_now().await;
        release.send(()).unwrap();

        let expected = Err(CoreError::StepExecutionError("boom".to_string()));
        assert_eq!(first.await.unwrap(), expected);
        assert_eq!(second.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_on_settle_runs_again_after_settlement() {
        let cache = ApplyFlowCache::new(CacheConfig::default());
        let executions = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let executions = executions.clone();
            let outcome = cache
                .run("k".to_string(), move || async move {
                    Ok(json!(executions.fetch_add(1, Ordering::SeqCst)))
                })
                .await;
            assert!(outcome.is_ok());
        }

        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retain_reuses_settled_outcome() {
        let cache = ApplyFlowCache::new(retain(60_000));
        let executions = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let executions = executions.clone();
            let outcome = cache
                .run("k".to_string(), move || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"ok": true}))
                })
                .await;
            assert_eq!(outcome, Ok(json!({"ok": true})));
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        let entry = cache.entry("k").unwrap();
        assert_eq!(entry.status, CacheStatus::Resolved);
        assert_eq!(entry.data, Some(json!({"ok": true})));

        assert!(cache.invalidate("k"));
        assert!(cache.status("k").is_none());
    }

    #[tokio::test]
    async fn test_retain_records_rejection() {
        let cache = ApplyFlowCache::new(retain(60_000));
        let outcome = cache
            .run("k".to_string(), || async {
                Err(CoreError::ActionNotFound("missing".to_string()))
            })
            .await;
        assert!(outcome.is_err());

        let entry = cache.entry("k").unwrap();
        assert_eq!(entry.status, CacheStatus::Rejected);
        assert_eq!(
            entry.error,
            Some(CoreError::ActionNotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_expired_entry_executes_again() {
        let cache = ApplyFlowCache::new(retain(0));
        let executions = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let executions = executions.clone();
            cache
                .run("k".to_string(), move || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                })
                .await
                .unwrap();
        }

        assert_eq!(executions.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_panicking_execution_is_rejected_and_evicted() {
        let cache = ApplyFlowCache::new(CacheConfig::default());
        let outcome = cache
            .run("k".to_string(), || async {
                if true {
                    panic!("step exploded");
                }
                Ok(Value::Null)
            })
            .await;

        assert!(matches!(outcome, Err(CoreError::FlowExecutionError(_))));
        assert!(cache.status("k").is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ApplyFlowCache::new(retain(60_000));
        cache.run("a".to_string(), || async { Ok(Value::Null) }).await.unwrap();
        cache.run("b".to_string(), || async { Ok(Value::Null) }).await.unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
