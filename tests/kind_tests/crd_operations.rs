//! Integration tests for CRD operations
//!
//! These tests tell the story of how users interact with TemporalCluster and
//! TemporalNamespace resources through the Kubernetes API.

use std::collections::BTreeMap;

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;

use temporal_operator::crd::{KubeDuration, TemporalCluster, TemporalNamespace};

use super::helpers::{ensure_test_cluster, sample_cluster, sample_namespace, TEST_NAMESPACE};

async fn cleanup_cluster(client: &Client, name: &str) {
    let api: Api<TemporalCluster> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

async fn cleanup_namespace(client: &Client, name: &str) {
    let api: Api<TemporalNamespace> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    // Nothing reconciles in these stories, so drop finalizers before deleting
    let _ = api
        .patch(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({"metadata": {"finalizers": null}})),
        )
        .await;
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: Platform operator creates a minimal TemporalCluster
///
/// Only persistence is required; everything else is filled in later by the
/// operator, so the stored object must accept the sparse spec as written.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_creates_minimal_cluster() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let api: Api<TemporalCluster> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "it-minimal";
    cleanup_cluster(&client, name).await;

    let created = api
        .create(&PostParams::default(), &sample_cluster(name))
        .await
        .expect("failed to create cluster");

    assert_eq!(created.metadata.name.as_deref(), Some(name));
    assert!(created.spec.version.is_empty(), "version is defaulted by the operator, not the API");
    assert!(created.spec.services.is_none());
    assert_eq!(created.spec.persistence.default_store, "default");
    assert!(!created.is_ready());

    cleanup_cluster(&client, name).await;
}

/// Story: Platform operator declares a namespace with search attributes
///
/// Types are free-form strings in the CRD; the operator validates them when
/// it reconciles, so the API stores whatever the user wrote.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_operator_declares_namespace_with_search_attributes() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let api: Api<TemporalNamespace> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "it-payments";
    cleanup_namespace(&client, name).await;

    let mut namespace = sample_namespace(name, "prod");
    namespace.spec.retention_period = Some(KubeDuration::from_hours(24));
    namespace.spec.custom_search_attributes = BTreeMap::from([
        ("CustomerId".to_string(), "Keyword".to_string()),
        ("Amount".to_string(), "Double".to_string()),
    ]);
    api.create(&PostParams::default(), &namespace)
        .await
        .expect("failed to create namespace");

    let fetched = api.get(name).await.expect("failed to get namespace");
    assert_eq!(fetched.spec.cluster_ref.name, "prod");
    assert_eq!(fetched.retention(), KubeDuration::from_hours(24));
    assert_eq!(fetched.spec.custom_search_attributes.len(), 2);
    assert!(!fetched.has_finalizer());

    cleanup_namespace(&client, name).await;
}

/// Story: The deletion finalizer blocks removal of a namespace
///
/// While the finalizer is present, deleting the object only marks it. Once
/// the finalizer is cleared the API server removes it.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_finalizer_holds_namespace_until_cleared() {
    let client = ensure_test_cluster().await.expect("failed to setup cluster");
    let api: Api<TemporalNamespace> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "it-finalized";
    cleanup_namespace(&client, name).await;

    let mut namespace = sample_namespace(name, "prod");
    namespace.spec.allow_deletion = true;
    namespace.add_finalizer();
    api.create(&PostParams::default(), &namespace)
        .await
        .expect("failed to create namespace");

    api.delete(name, &DeleteParams::default())
        .await
        .expect("failed to request deletion");
    let marked = api.get(name).await.expect("namespace should still exist");
    assert!(marked.is_deleting());
    assert!(marked.has_finalizer());

    cleanup_namespace(&client, name).await;
    let gone = api.get_opt(name).await.expect("failed to read namespace");
    assert!(gone.is_none(), "clearing the finalizer should release the object");
}
