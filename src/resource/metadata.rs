//! Labels, annotations and owner references for child objects
//!
//! Builder-owned keys are always rewritten; keys added by third parties
//! (admission controllers, users with `kubectl label`) survive a merge.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::crd::TemporalCluster;
use crate::Error;

/// `app.kubernetes.io/name` label key
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
/// `app.kubernetes.io/instance` label key
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
/// `app.kubernetes.io/component` label key
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
/// `app.kubernetes.io/version` label key
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";
/// `app.kubernetes.io/managed-by` label key
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// `app.kubernetes.io/part-of` label key
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
/// Marks headless discovery services
pub const LABEL_HEADLESS: &str = "temporal.io/headless";
/// Records which TemporalCluster an object was generated for
pub const ANNOTATION_CLUSTER: &str = "temporal.io/cluster";

/// Value of the managed-by label
pub const MANAGED_BY: &str = "temporal-operator";

/// Never copied from the cluster onto children
const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Labels every child of `cluster` carries for the given component
///
/// The cluster's own labels are propagated underneath the standard set.
pub fn labels(cluster: &TemporalCluster, component: &str, version: &str) -> BTreeMap<String, String> {
    let mut labels = cluster.labels().clone();
    labels.extend([
        (LABEL_NAME.to_string(), "temporal".to_string()),
        (LABEL_INSTANCE.to_string(), cluster.name_any()),
        (LABEL_COMPONENT.to_string(), component.to_string()),
        (LABEL_VERSION.to_string(), version.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
        (LABEL_PART_OF.to_string(), "temporal".to_string()),
    ]);
    labels
}

/// Minimal stable label set used as a pod selector
pub fn selector(cluster: &TemporalCluster, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), "temporal".to_string()),
        (LABEL_INSTANCE.to_string(), cluster.name_any()),
        (LABEL_COMPONENT.to_string(), component.to_string()),
    ])
}

/// Extra labels for headless discovery services
pub fn headless_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_HEADLESS.to_string(), "true".to_string())])
}

/// Annotations propagated from the cluster, minus kubectl bookkeeping
pub fn annotations(cluster: &TemporalCluster) -> BTreeMap<String, String> {
    let mut annotations: BTreeMap<String, String> = cluster
        .annotations()
        .iter()
        .filter(|(k, _)| k.as_str() != LAST_APPLIED_ANNOTATION)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    annotations.insert(ANNOTATION_CLUSTER.to_string(), cluster.name_any());
    annotations
}

/// Union of `existing` and each overlay, later maps winning on key clashes
pub fn merge(
    existing: Option<&BTreeMap<String, String>>,
    overlays: &[&BTreeMap<String, String>],
) -> BTreeMap<String, String> {
    let mut merged = existing.cloned().unwrap_or_default();
    for overlay in overlays {
        merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Make `cluster` the controller owner of an object
///
/// An existing reference to the same cluster (by uid) is replaced in place,
/// other non-controller references are kept, and a different controller is
/// an error.
pub fn set_controller_reference(cluster: &TemporalCluster, meta: &mut ObjectMeta) -> Result<(), Error> {
    let object = format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    );
    let owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
        Error::builder(
            object.clone(),
            format!("owner {} has no uid yet", cluster.object_key()),
        )
    })?;

    let references = meta.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = references
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner.uid)
    {
        return Err(Error::builder(
            object,
            format!("already controlled by {} {}", other.kind, other.name),
        ));
    }

    match references.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) => *existing = owner,
        None => references.push(owner),
    }
    Ok(())
}
