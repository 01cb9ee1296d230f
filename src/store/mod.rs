//! Object store boundary
//!
//! Reconcilers read and write Kubernetes objects only through [`ObjectStore`],
//! so the state machines can be exercised against an in-memory store in unit
//! tests. [`KubeObjectStore`] is the production implementation.

mod kubernetes;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::Serialize;

pub use kubernetes::KubeObjectStore;

use crate::crd::{
    TemporalCluster, TemporalClusterStatus, TemporalNamespace, TemporalNamespaceStatus,
};
use crate::resource::{ChildKind, ChildResource};
use crate::Error;

/// Changes computed at the end of a reconcile pass
///
/// Both writes are conditioned on a resourceVersion so a pass that acted on
/// a stale snapshot is rejected with [`Error::Conflict`] rather than
/// overwriting a newer write.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectPatch<S> {
    /// resourceVersion observed at the start of the pass
    pub resource_version: Option<String>,
    /// New finalizer list, when it changed
    pub finalizers: Option<Vec<String>>,
    /// New status, when it changed
    pub status: Option<S>,
}

impl<S> ObjectPatch<S> {
    /// True when there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.finalizers.is_none() && self.status.is_none()
    }
}

impl<S: Serialize> ObjectPatch<S> {
    /// JSON merge patch for the metadata part
    pub fn metadata_merge_patch(&self) -> Option<serde_json::Value> {
        self.finalizers.as_ref().map(|finalizers| {
            serde_json::json!({
                "metadata": {
                    "resourceVersion": self.resource_version,
                    "finalizers": finalizers,
                }
            })
        })
    }

    /// JSON merge patch for the status subresource
    ///
    /// `resource_version` is the version the write is conditioned on: the
    /// snapshot's, or the one returned by the metadata patch when that ran
    /// first.
    pub fn status_merge_patch(&self, resource_version: Option<&str>) -> Option<serde_json::Value> {
        self.status.as_ref().map(|status| {
            serde_json::json!({
                "metadata": { "resourceVersion": resource_version },
                "status": status,
            })
        })
    }
}

/// Read/write access to the objects the operator manages
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a TemporalCluster; `None` when it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<TemporalCluster>, Error>;

    /// Replace a TemporalCluster, conditioned on its resourceVersion
    async fn replace_cluster(&self, cluster: &TemporalCluster) -> Result<TemporalCluster, Error>;

    /// Apply an end-of-pass patch to a TemporalCluster
    async fn patch_cluster(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalClusterStatus>,
    ) -> Result<(), Error>;

    /// Fetch a TemporalNamespace; `None` when it does not exist
    async fn get_namespace(&self, namespace: &str, name: &str) -> Result<Option<TemporalNamespace>, Error>;

    /// List TemporalNamespaces across all namespaces
    async fn list_namespaces(&self) -> Result<Vec<TemporalNamespace>, Error>;

    /// Apply an end-of-pass patch to a TemporalNamespace
    async fn patch_namespace(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalNamespaceStatus>,
    ) -> Result<(), Error>;

    /// Fetch a child object; `None` when it does not exist
    async fn get_child(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error>;

    /// Create a child object
    async fn create_child(&self, object: &ChildResource) -> Result<ChildResource, Error>;

    /// Replace a child object, conditioned on its resourceVersion
    async fn replace_child(&self, object: &ChildResource) -> Result<ChildResource, Error>;

    /// Delete a child object; deleting an absent object succeeds
    async fn delete_child(&self, kind: ChildKind, namespace: &str, name: &str) -> Result<(), Error>;
}
