//! Shared setup for the kind stories

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, CustomResourceExt};

use temporal_operator::crd::{
    ClusterReference, PersistenceSpec, TemporalCluster, TemporalClusterSpec, TemporalNamespace,
    TemporalNamespaceSpec,
};
use temporal_operator::FIELD_MANAGER;

/// Namespace every story works in
pub const TEST_NAMESPACE: &str = "temporal-operator-it";

/// Connect to the current context and make sure the CRDs and the test
/// namespace exist
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let client = Client::try_default()
        .await
        .map_err(|e| format!("failed to create client: {e}"))?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    for crd in [TemporalCluster::crd(), TemporalNamespace::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| format!("failed to apply CRD {name}: {e}"))?;
    }
    // Give the API server a moment to serve the new kinds
    tokio::time::sleep(Duration::from_secs(2)).await;

    let namespaces: Api<Namespace> = Api::all(client.clone());
    if namespaces
        .get_opt(TEST_NAMESPACE)
        .await
        .map_err(|e| format!("failed to read namespace: {e}"))?
        .is_none()
    {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        namespaces
            .create(&PostParams::default(), &ns)
            .await
            .map_err(|e| format!("failed to create namespace: {e}"))?;
    }

    Ok(client)
}

/// A minimal cluster as a user would write it
pub fn sample_cluster(name: &str) -> TemporalCluster {
    let mut cluster = TemporalCluster::new(
        name,
        TemporalClusterSpec {
            persistence: PersistenceSpec {
                default_store: "default".to_string(),
                visibility_store: None,
            },
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    cluster
}

/// A namespace referencing `cluster` in the test namespace
pub fn sample_namespace(name: &str, cluster: &str) -> TemporalNamespace {
    let mut namespace = TemporalNamespace::new(
        name,
        TemporalNamespaceSpec {
            cluster_ref: ClusterReference {
                name: cluster.to_string(),
                namespace: None,
            },
            ..Default::default()
        },
    );
    namespace.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    namespace
}
