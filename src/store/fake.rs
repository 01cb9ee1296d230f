//! In-memory [`ObjectStore`] for unit tests
//!
//! Behaves like the API server where the reconcilers care: writes bump
//! `resourceVersion`, stale writes fail with [`Error::Conflict`], and a
//! deleting object disappears once its last finalizer is removed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::DeploymentStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use parking_lot::Mutex;

use super::{ObjectPatch, ObjectStore};
use crate::crd::conditions::{set_condition, CONDITION_READY};
use crate::crd::{
    Condition, ConditionStatus, TemporalCluster, TemporalClusterStatus, TemporalNamespace,
    TemporalNamespaceStatus,
};
use crate::resource::{ChildKind, ChildResource};
use crate::Error;

type Key = (String, String);

#[derive(Default)]
struct FakeState {
    clusters: HashMap<Key, TemporalCluster>,
    namespaces: HashMap<Key, TemporalNamespace>,
    children: HashMap<(ChildKind, String, String), ChildResource>,
    version: u64,
    writes: usize,
    delete_calls: usize,
}

impl FakeState {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn stamp_new(meta: &mut ObjectMeta, version: String) {
    meta.resource_version = Some(version);
    meta.generation = Some(1);
    if meta.uid.is_none() {
        meta.uid = Some(format!(
            "uid-{}-{}",
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default()
        ));
    }
}

fn check_version(stored: &ObjectMeta, expected: Option<&String>, object: &str) -> Result<(), Error> {
    match expected {
        Some(expected) if stored.resource_version.as_ref() != Some(expected) => Err(Error::conflict(
            object,
            format!(
                "resourceVersion {expected} is stale, current is {}",
                stored.resource_version.as_deref().unwrap_or_default()
            ),
        )),
        _ => Ok(()),
    }
}

/// In-memory object store
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<FakeState>,
}

impl InMemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a TemporalCluster, assigning uid and resourceVersion
    pub fn insert_cluster(&self, mut cluster: TemporalCluster) -> TemporalCluster {
        let mut state = self.state.lock();
        let version = state.next_version();
        stamp_new(&mut cluster.metadata, version);
        let k = key(
            cluster.metadata.namespace.as_deref().unwrap_or_default(),
            cluster.metadata.name.as_deref().unwrap_or_default(),
        );
        state.clusters.insert(k, cluster.clone());
        cluster
    }

    /// Seed a TemporalNamespace, assigning uid and resourceVersion
    pub fn insert_namespace(&self, mut namespace: TemporalNamespace) -> TemporalNamespace {
        let mut state = self.state.lock();
        let version = state.next_version();
        stamp_new(&mut namespace.metadata, version);
        let k = key(
            namespace.metadata.namespace.as_deref().unwrap_or_default(),
            namespace.metadata.name.as_deref().unwrap_or_default(),
        );
        state.namespaces.insert(k, namespace.clone());
        namespace
    }

    /// Current TemporalCluster
    pub fn cluster(&self, namespace: &str, name: &str) -> Option<TemporalCluster> {
        self.state.lock().clusters.get(&key(namespace, name)).cloned()
    }

    /// Current TemporalNamespace
    pub fn namespace(&self, namespace: &str, name: &str) -> Option<TemporalNamespace> {
        self.state.lock().namespaces.get(&key(namespace, name)).cloned()
    }

    /// Current child object
    pub fn child(&self, kind: ChildKind, namespace: &str, name: &str) -> Option<ChildResource> {
        self.state
            .lock()
            .children
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Remove a TemporalCluster outright
    pub fn remove_cluster(&self, namespace: &str, name: &str) {
        self.state.lock().clusters.remove(&key(namespace, name));
    }

    /// Number of writes issued through the [`ObjectStore`] trait
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Number of child DELETE requests, including ones that found nothing
    pub fn delete_calls(&self) -> usize {
        self.state.lock().delete_calls
    }

    /// Set the cluster's Ready condition, as its own reconciler would
    pub fn set_cluster_ready(&self, namespace: &str, name: &str, ready: bool) {
        let mut state = self.state.lock();
        let version = state.next_version();
        if let Some(cluster) = state.clusters.get_mut(&key(namespace, name)) {
            let status = cluster.status.get_or_insert_with(TemporalClusterStatus::default);
            let (value, reason) = if ready {
                (ConditionStatus::True, "ServicesReady")
            } else {
                (ConditionStatus::False, "ServicesNotReady")
            };
            set_condition(
                &mut status.conditions,
                Condition::new(CONDITION_READY, value, reason, ""),
            );
            cluster.metadata.resource_version = Some(version);
        }
    }

    /// Mark every Deployment in a namespace as fully rolled out
    pub fn roll_out_deployments(&self, namespace: &str) {
        let mut state = self.state.lock();
        for ((_, ns, _), child) in state.children.iter_mut() {
            if ns != namespace {
                continue;
            }
            if let ChildResource::Deployment(deployment) = child {
                let replicas = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                deployment.status = Some(DeploymentStatus {
                    replicas: Some(replicas),
                    ready_replicas: Some(replicas),
                    observed_generation: deployment.metadata.generation,
                    ..Default::default()
                });
            }
        }
    }

    /// Modify a child object as a third party would
    pub fn edit_child(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
        edit: impl FnOnce(&mut ChildResource),
    ) {
        let mut state = self.state.lock();
        let version = state.next_version();
        if let Some(child) = state
            .children
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
        {
            edit(child);
            child.meta_mut().resource_version = Some(version);
        }
    }

    /// Modify a TemporalNamespace as a concurrent writer would
    pub fn edit_namespace(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut TemporalNamespace)) {
        let mut state = self.state.lock();
        let version = state.next_version();
        if let Some(obj) = state.namespaces.get_mut(&key(namespace, name)) {
            edit(obj);
            obj.metadata.resource_version = Some(version);
        }
    }

    /// Request deletion: objects with finalizers get a deletion timestamp,
    /// others vanish immediately
    pub fn delete_namespace(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock();
        let version = state.next_version();
        let k = key(namespace, name);
        let Some(obj) = state.namespaces.get_mut(&k) else {
            return;
        };
        if obj.metadata.finalizers.as_ref().map_or(true, Vec::is_empty) {
            state.namespaces.remove(&k);
            return;
        }
        obj.metadata.deletion_timestamp = Some(Time(Utc::now()));
        obj.metadata.resource_version = Some(version);
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<TemporalCluster>, Error> {
        Ok(self.cluster(namespace, name))
    }

    async fn replace_cluster(&self, cluster: &TemporalCluster) -> Result<TemporalCluster, Error> {
        let mut state = self.state.lock();
        let namespace = cluster.metadata.namespace.clone().unwrap_or_default();
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let object = format!("{namespace}/{name}");
        let version = state.next_version();
        let stored = state
            .clusters
            .get_mut(&key(&namespace, &name))
            .ok_or_else(|| Error::conflict(&object, "not found"))?;
        check_version(&stored.metadata, cluster.metadata.resource_version.as_ref(), &object)?;

        if stored.spec != cluster.spec {
            stored.metadata.generation = Some(stored.metadata.generation.unwrap_or(0) + 1);
        }
        stored.spec = cluster.spec.clone();
        stored.metadata.labels = cluster.metadata.labels.clone();
        stored.metadata.annotations = cluster.metadata.annotations.clone();
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.writes += 1;
        Ok(updated)
    }

    async fn patch_cluster(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalClusterStatus>,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        let object = format!("{namespace}/{name}");
        let version = state.next_version();
        let stored = state
            .clusters
            .get_mut(&key(namespace, name))
            .ok_or_else(|| Error::conflict(&object, "not found"))?;
        check_version(&stored.metadata, patch.resource_version.as_ref(), &object)?;
        if let Some(finalizers) = &patch.finalizers {
            stored.metadata.finalizers = Some(finalizers.clone());
        }
        if let Some(status) = &patch.status {
            stored.status = Some(status.clone());
        }
        stored.metadata.resource_version = Some(version);
        state.writes += 1;
        Ok(())
    }

    async fn get_namespace(&self, namespace: &str, name: &str) -> Result<Option<TemporalNamespace>, Error> {
        Ok(self.namespace(namespace, name))
    }

    async fn list_namespaces(&self) -> Result<Vec<TemporalNamespace>, Error> {
        Ok(self.state.lock().namespaces.values().cloned().collect())
    }

    async fn patch_namespace(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalNamespaceStatus>,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        let object = format!("{namespace}/{name}");
        let version = state.next_version();
        let k = key(namespace, name);
        let stored = state
            .namespaces
            .get_mut(&k)
            .ok_or_else(|| Error::conflict(&object, "not found"))?;
        check_version(&stored.metadata, patch.resource_version.as_ref(), &object)?;
        if let Some(finalizers) = &patch.finalizers {
            stored.metadata.finalizers = Some(finalizers.clone());
        }
        if let Some(status) = &patch.status {
            stored.status = Some(status.clone());
        }
        stored.metadata.resource_version = Some(version);
        let released = stored.metadata.deletion_timestamp.is_some()
            && stored.metadata.finalizers.as_ref().map_or(true, Vec::is_empty);
        if released {
            state.namespaces.remove(&k);
        }
        state.writes += 1;
        Ok(())
    }

    async fn get_child(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error> {
        Ok(self.child(kind, namespace, name))
    }

    async fn create_child(&self, object: &ChildResource) -> Result<ChildResource, Error> {
        let mut state = self.state.lock();
        let k = (object.kind(), object.namespace().to_string(), object.name().to_string());
        if state.children.contains_key(&k) {
            return Err(Error::conflict(object.display_key(), "already exists"));
        }
        let version = state.next_version();
        let mut created = object.clone();
        stamp_new(created.meta_mut(), version);
        state.children.insert(k, created.clone());
        state.writes += 1;
        Ok(created)
    }

    async fn replace_child(&self, object: &ChildResource) -> Result<ChildResource, Error> {
        let mut state = self.state.lock();
        let k = (object.kind(), object.namespace().to_string(), object.name().to_string());
        let version = state.next_version();
        let stored = state
            .children
            .get_mut(&k)
            .ok_or_else(|| Error::conflict(object.display_key(), "not found"))?;
        check_version(
            stored.meta(),
            object.meta().resource_version.as_ref(),
            &object.display_key(),
        )?;

        let generation = stored.meta().generation.unwrap_or(0) + 1;
        let mut replaced = object.clone();
        replaced.meta_mut().generation = Some(generation);
        replaced.meta_mut().resource_version = Some(version);
        *stored = replaced.clone();
        state.writes += 1;
        Ok(replaced)
    }

    async fn delete_child(&self, kind: ChildKind, namespace: &str, name: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.delete_calls += 1;
        if state
            .children
            .remove(&(kind, namespace.to_string(), name.to_string()))
            .is_some()
        {
            state.writes += 1;
        }
        Ok(())
    }
}
