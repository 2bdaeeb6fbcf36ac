use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::model::FlowModel;

/// Live model instances keyed by uid, plus an explicit uid -> child uids index.
///
/// The adjacency index is maintained separately from the instances so that
/// removal never walks the tree unless a caller asks for it.
#[derive(Default)]
pub struct ModelInstanceRegistry {
    models: DashMap<String, Arc<FlowModel>>,
    children: DashMap<String, Vec<String>>,
}

impl ModelInstanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `model` unless its uid is taken.
    ///
    /// Returns the registered instance and whether it is the one just inserted.
    pub fn insert_or_existing(&self, model: Arc<FlowModel>) -> (Arc<FlowModel>, bool) {
        match self.models.entry(model.uid().to_string()) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(slot) => {
                slot.insert(model.clone());
                (model, true)
            }
        }
    }

    /// Look up a live instance
    pub fn get(&self, uid: &str) -> Option<Arc<FlowModel>> {
        self.models.get(uid).map(|entry| entry.value().clone())
    }

    /// Whether `uid` resolves to a live instance
    pub fn contains(&self, uid: &str) -> bool {
        self.models.contains_key(uid)
    }

    /// Record `child_uid` under `parent_uid`
    pub fn link_child(&self, parent_uid: &str, child_uid: &str) {
        let mut children = self.children.entry(parent_uid.to_string()).or_default();
        if !children.iter().any(|uid| uid == child_uid) {
            children.push(child_uid.to_string());
        }
    }

    /// Uids of the direct children of `uid`, in link order
    pub fn children(&self, uid: &str) -> Vec<String> {
        self.children
            .get(uid)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Uids below `uid`, deepest first
    pub fn descendants(&self, uid: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_descendants(uid, &mut out);
        out
    }

    fn collect_descendants(&self, uid: &str, out: &mut Vec<String>) {
        for child in self.children(uid) {
            if out.contains(&child) || child == uid {
                continue;
            }
            self.collect_descendants(&child, out);
            out.push(child);
        }
    }

    /// Remove one instance.
    ///
    /// The uid is detached from its parent's child list and its own child
    /// list is dropped; the children themselves stay registered.
    pub fn remove(&self, uid: &str) -> Option<Arc<FlowModel>> {
        let (_, model) = self.models.remove(uid)?;

        if let Some(parent_id) = model.parent_id() {
            if let Some(mut siblings) = self.children.get_mut(&parent_id) {
                siblings.retain(|child| child != uid);
            }
        }
        self.children.remove(uid);

        Some(model)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no instance is live
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
