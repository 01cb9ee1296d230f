//! Dependency index from TemporalClusters to the TemporalNamespaces that
//! reference them
//!
//! Cluster events are mapped through the index to wake dependents as soon as
//! a cluster turns ready. The namespace reconciler's own readiness check and
//! poll remain the backstop, so a stale entry only delays a wake-up.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use parking_lot::RwLock;

use crate::crd::{TemporalCluster, TemporalNamespace};

/// Namespace-qualified object name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Kubernetes namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key for `namespace/name`
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of any namespaced resource
    pub fn of<K: kube::Resource>(object: &K) -> Self {
        Self::new(object.namespace().unwrap_or_default(), object.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Default)]
struct IndexState {
    dependents: HashMap<ObjectKey, BTreeSet<ObjectKey>>,
    parent_of: HashMap<ObjectKey, ObjectKey>,
}

impl IndexState {
    fn unlink(&mut self, dependent: &ObjectKey) -> Option<ObjectKey> {
        let parent = self.parent_of.remove(dependent)?;
        if let Some(set) = self.dependents.get_mut(&parent) {
            set.remove(dependent);
            if set.is_empty() {
                self.dependents.remove(&parent);
            }
        }
        Some(parent)
    }

    fn link(&mut self, dependent: ObjectKey, parent: ObjectKey) {
        self.unlink(&dependent);
        self.dependents
            .entry(parent.clone())
            .or_default()
            .insert(dependent.clone());
        self.parent_of.insert(dependent, parent);
    }
}

/// Cluster key to dependent namespace keys, with a reverse map so a
/// namespace that changes its reference moves rather than duplicates
#[derive(Default)]
pub struct DependencyIndex {
    state: RwLock<IndexState>,
}

impl DependencyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index from a full scan
    pub fn rebuild(&self, namespaces: &[TemporalNamespace]) {
        let mut fresh = IndexState::default();
        for namespace in namespaces {
            fresh.link(namespace.object_key(), namespace.cluster_key());
        }
        *self.state.write() = fresh;
    }

    /// Record (or move) a namespace under the cluster it references
    pub fn upsert(&self, namespace: &TemporalNamespace) {
        let key = namespace.object_key();
        let parent = namespace.cluster_key();
        {
            let state = self.state.read();
            if state.parent_of.get(&key) == Some(&parent) {
                return;
            }
        }
        self.state.write().link(key, parent);
    }

    /// Forget a namespace
    pub fn remove(&self, namespace: &ObjectKey) {
        self.state.write().unlink(namespace);
    }

    /// Namespaces that reference the given cluster, sorted
    pub fn dependents_of(&self, cluster: &ObjectKey) -> Vec<ObjectKey> {
        self.state
            .read()
            .dependents
            .get(cluster)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of indexed namespaces
    pub fn len(&self) -> usize {
        self.state.read().parent_of.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reconcile requests for every namespace depending on `cluster`
pub fn propagate(index: &DependencyIndex, cluster: &TemporalCluster) -> Vec<ObjectRef<TemporalNamespace>> {
    index
        .dependents_of(&ObjectKey::of(cluster))
        .into_iter()
        .map(|key| ObjectRef::new(&key.name).within(&key.namespace))
        .collect()
}
