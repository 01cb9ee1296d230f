//! [`ObjectStore`] backed by the Kubernetes API

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{ObjectPatch, ObjectStore};
use crate::crd::{
    TemporalCluster, TemporalClusterStatus, TemporalNamespace, TemporalNamespaceStatus,
};
use crate::error::map_conflict;
use crate::resource::{ChildKind, ChildResource};
use crate::Error;

/// Kubernetes API implementation of [`ObjectStore`]
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Metadata patch first, then status, each conditioned on resourceVersion
///
/// A status write that finds the object gone is ignored: removing the last
/// finalizer of a deleting object lets the API server drop it immediately.
async fn apply_patch<K, S>(api: &Api<K>, object: &str, name: &str, patch: &ObjectPatch<S>) -> Result<(), Error>
where
    K: kube::Resource + Clone + DeserializeOwned + Debug,
    S: Serialize,
{
    let params = PatchParams::default();
    let mut resource_version = patch.resource_version.clone();
    if let Some(metadata) = patch.metadata_merge_patch() {
        let updated = api
            .patch(name, &params, &Patch::Merge(&metadata))
            .await
            .map_err(|e| map_conflict(object, e))?;
        // The status write follows our own metadata write
        resource_version = updated.resource_version();
    }
    if let Some(status) = patch.status_merge_patch(resource_version.as_deref()) {
        match api.patch_status(name, &params, &Patch::Merge(&status)).await {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(%object, "object removed before status write");
            }
            Err(e) => return Err(map_conflict(object, e)),
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<TemporalCluster>, Error> {
        Ok(self.api::<TemporalCluster>(namespace).get_opt(name).await?)
    }

    async fn replace_cluster(&self, cluster: &TemporalCluster) -> Result<TemporalCluster, Error> {
        let namespace = cluster.namespace().unwrap_or_default();
        let name = cluster.name_any();
        self.api::<TemporalCluster>(&namespace)
            .replace(&name, &PostParams::default(), cluster)
            .await
            .map_err(|e| map_conflict(&key(&namespace, &name), e))
    }

    async fn patch_cluster(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalClusterStatus>,
    ) -> Result<(), Error> {
        let api = self.api::<TemporalCluster>(namespace);
        apply_patch(&api, &key(namespace, name), name, patch).await
    }

    async fn get_namespace(&self, namespace: &str, name: &str) -> Result<Option<TemporalNamespace>, Error> {
        Ok(self.api::<TemporalNamespace>(namespace).get_opt(name).await?)
    }

    async fn list_namespaces(&self) -> Result<Vec<TemporalNamespace>, Error> {
        let api: Api<TemporalNamespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn patch_namespace(
        &self,
        namespace: &str,
        name: &str,
        patch: &ObjectPatch<TemporalNamespaceStatus>,
    ) -> Result<(), Error> {
        let api = self.api::<TemporalNamespace>(namespace);
        apply_patch(&api, &key(namespace, name), name, patch).await
    }

    async fn get_child(
        &self,
        kind: ChildKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ChildResource>, Error> {
        let found = match kind {
            ChildKind::Service => self
                .api::<Service>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::Service),
            ChildKind::Deployment => self
                .api::<Deployment>(namespace)
                .get_opt(name)
                .await?
                .map(ChildResource::Deployment),
        };
        Ok(found)
    }

    async fn create_child(&self, object: &ChildResource) -> Result<ChildResource, Error> {
        let params = PostParams::default();
        let object_key = object.display_key();
        let created = match object {
            ChildResource::Service(service) => self
                .api::<Service>(object.namespace())
                .create(&params, service)
                .await
                .map(ChildResource::Service),
            ChildResource::Deployment(deployment) => self
                .api::<Deployment>(object.namespace())
                .create(&params, deployment)
                .await
                .map(ChildResource::Deployment),
        };
        created.map_err(|e| map_conflict(&object_key, e))
    }

    async fn replace_child(&self, object: &ChildResource) -> Result<ChildResource, Error> {
        let params = PostParams::default();
        let object_key = object.display_key();
        let replaced = match object {
            ChildResource::Service(service) => self
                .api::<Service>(object.namespace())
                .replace(object.name(), &params, service)
                .await
                .map(ChildResource::Service),
            ChildResource::Deployment(deployment) => self
                .api::<Deployment>(object.namespace())
                .replace(object.name(), &params, deployment)
                .await
                .map(ChildResource::Deployment),
        };
        replaced.map_err(|e| map_conflict(&object_key, e))
    }

    async fn delete_child(&self, kind: ChildKind, namespace: &str, name: &str) -> Result<(), Error> {
        let params = DeleteParams::background();
        let result = match kind {
            ChildKind::Service => self
                .api::<Service>(namespace)
                .delete(name, &params)
                .await
                .map(|_| ()),
            ChildKind::Deployment => self
                .api::<Deployment>(namespace)
                .delete(name, &params)
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
