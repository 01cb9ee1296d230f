//! TemporalNamespace Custom Resource Definition
//!
//! A TemporalNamespace is a logical namespace inside a Temporal server. It
//! references exactly one TemporalCluster and is registered through that
//! cluster's frontend once the cluster reports ready.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterReference, Condition, KubeDuration};
use crate::index::ObjectKey;

/// Finalizer blocking removal until the remote namespace is deleted
pub const DELETION_FINALIZER: &str = "temporal.io/deletion-finalizer";

/// Retention applied when a namespace is registered without one
pub const DEFAULT_RETENTION: KubeDuration = KubeDuration::from_hours(72);

/// Specification for a TemporalNamespace
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "temporal.io",
    version = "v1beta1",
    kind = "TemporalNamespace",
    plural = "temporalnamespaces",
    shortname = "tns",
    status = "TemporalNamespaceStatus",
    namespaced,
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.clusterRef.name"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TemporalNamespaceSpec {
    /// Cluster this namespace lives in
    pub cluster_ref: ClusterReference,

    /// Namespace description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owner contact address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,

    /// Workflow history retention (defaults to 72h)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<KubeDuration>,

    /// Free-form namespace data
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    /// Register as a global (multi-cluster) namespace
    #[serde(default)]
    pub is_global_namespace: bool,

    /// Delete the remote namespace when this object is deleted
    #[serde(default)]
    pub allow_deletion: bool,

    /// Custom search attributes, name to type (e.g. `Keyword`, `Int`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_search_attributes: BTreeMap<String, String>,
}

/// Status for a TemporalNamespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TemporalNamespaceStatus {
    /// Conditions representing the namespace state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl TemporalNamespace {
    /// Key of the TemporalCluster this namespace references
    pub fn cluster_key(&self) -> ObjectKey {
        let own = self.namespace().unwrap_or_default();
        let ns = self.spec.cluster_ref.resolve_namespace(&own).to_string();
        ObjectKey::new(ns, self.spec.cluster_ref.name.clone())
    }

    /// Key of this object
    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// True when deletion has been requested
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// True when the deletion finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == DELETION_FINALIZER)
    }

    /// Add the deletion finalizer; returns whether it was missing
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().push(DELETION_FINALIZER.to_string());
        true
    }

    /// Remove the deletion finalizer; returns whether it was present
    pub fn remove_finalizer(&mut self) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != DELETION_FINALIZER);
        finalizers.len() != before
    }

    /// Retention to register with, falling back to the default
    pub fn retention(&self) -> KubeDuration {
        self.spec.retention_period.unwrap_or(DEFAULT_RETENTION)
    }
}
