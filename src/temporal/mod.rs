//! Temporal server control-plane client
//!
//! The namespace reconciler only talks to the server through
//! [`TemporalClient`]. A client is opened per reconcile pass by a
//! [`TemporalClientFactory`] and closed before the pass returns.

pub mod http;
pub mod search_attributes;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;

pub use http::HttpClientFactory;
pub use search_attributes::{
    plan_search_attributes, reconcile_search_attributes, SearchAttributePlan, SearchAttributeType,
};

use crate::crd::{TemporalCluster, TemporalNamespace};
use crate::Error;

/// Namespace registration or update payload
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRequest {
    /// Remote namespace name (the TemporalNamespace's name)
    pub namespace: String,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owner contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    /// Workflow history retention
    #[serde(skip)]
    pub retention: Duration,
    /// Free-form data
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    /// Global (multi-cluster) namespace
    pub is_global_namespace: bool,
    /// Active cluster name, the owning TemporalCluster
    pub active_cluster_name: String,
}

impl NamespaceRequest {
    /// Build the request for `namespace` registered on `cluster`
    pub fn new(cluster: &TemporalCluster, namespace: &TemporalNamespace) -> Self {
        Self {
            namespace: namespace.name_any(),
            description: namespace.spec.description.clone(),
            owner_email: namespace.spec.owner_email.clone(),
            retention: namespace.retention().as_duration(),
            data: namespace.spec.data.clone(),
            is_global_namespace: namespace.spec.is_global_namespace,
            active_cluster_name: cluster.name_any(),
        }
    }
}

/// Operations on a single Temporal server
///
/// Failures are reported as [`Error::Remote`] with a
/// [`RemoteErrorKind`](crate::error::RemoteErrorKind) so callers can
/// recognise already-exists and not-found.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TemporalClient: Send + Sync {
    /// Register a new namespace
    async fn register_namespace(&self, request: &NamespaceRequest) -> Result<(), Error>;

    /// Update an existing namespace's configuration
    async fn update_namespace(&self, request: &NamespaceRequest) -> Result<(), Error>;

    /// Delete a namespace
    async fn delete_namespace(&self, namespace: &str) -> Result<(), Error>;

    /// Custom search attributes currently registered for a namespace
    async fn list_search_attributes(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, SearchAttributeType>, Error>;

    /// Register custom search attributes
    async fn add_search_attributes(
        &self,
        namespace: &str,
        attributes: &BTreeMap<String, SearchAttributeType>,
    ) -> Result<(), Error>;

    /// Remove custom search attributes by name
    async fn remove_search_attributes(&self, namespace: &str, names: &[String]) -> Result<(), Error>;

    /// Release the connection
    async fn close(&self);
}

/// Opens a [`TemporalClient`] for a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TemporalClientFactory: Send + Sync {
    /// Connect to the cluster's frontend
    async fn connect(&self, cluster: &TemporalCluster) -> Result<Box<dyn TemporalClient>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ClusterReference, KubeDuration, TemporalClusterSpec, TemporalNamespaceSpec};

    #[test]
    fn test_request_from_spec() {
        let cluster = TemporalCluster::new("prod", TemporalClusterSpec::default());
        let mut namespace = TemporalNamespace::new(
            "payments",
            TemporalNamespaceSpec {
                cluster_ref: ClusterReference {
                    name: "prod".to_string(),
                    namespace: None,
                },
                description: Some("payment workflows".to_string()),
                ..Default::default()
            },
        );

        let request = NamespaceRequest::new(&cluster, &namespace);
        assert_eq!(request.namespace, "payments");
        assert_eq!(request.active_cluster_name, "prod");
        assert_eq!(request.retention, Duration::from_secs(72 * 3600));
        assert_eq!(request.description.as_deref(), Some("payment workflows"));

        namespace.spec.retention_period = Some(KubeDuration::from_hours(1));
        assert_eq!(
            NamespaceRequest::new(&cluster, &namespace).retention,
            Duration::from_secs(3600)
        );
    }
}
