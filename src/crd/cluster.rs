//! TemporalCluster Custom Resource Definition
//!
//! A TemporalCluster describes the deployment topology of a Temporal server:
//! which services run, on which ports, with which images. The operator
//! derives Services and Deployments from it and owns them through controller
//! owner references.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::{is_condition_true, CONDITION_READY};
use super::types::{
    AdminToolsSpec, Condition, MTLSSpec, PersistenceSpec, ServiceStatus, ServicesSpec,
    TemporalService, UISpec, TEMPORAL_SERVICES,
};
use crate::Error;

/// Specification for a TemporalCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "temporal.io",
    version = "v1beta1",
    kind = "TemporalCluster",
    plural = "temporalclusters",
    shortname = "tc",
    status = "TemporalClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TemporalClusterSpec {
    /// Temporal server version (image tag)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Temporal server image repository
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Per-service settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicesSpec>,

    /// Datastore selection
    #[serde(default)]
    pub persistence: PersistenceSpec,

    /// Mutual TLS policy
    #[serde(rename = "mTLS", default, skip_serializing_if = "Option::is_none")]
    pub mtls: Option<MTLSSpec>,

    /// Web UI deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UISpec>,

    /// Admin tools deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admintools: Option<AdminToolsSpec>,
}

impl TemporalClusterSpec {
    /// True when mTLS certificates are managed by cert-manager
    pub fn mtls_enabled(&self) -> bool {
        self.mtls.as_ref().is_some_and(MTLSSpec::cert_manager_enabled)
    }

    /// True when the UI should be deployed
    pub fn ui_enabled(&self) -> bool {
        self.ui.as_ref().is_some_and(|ui| ui.enabled)
    }

    /// True when the admin tools pod should be deployed
    pub fn admintools_enabled(&self) -> bool {
        self.admintools.as_ref().is_some_and(|a| a.enabled)
    }

    /// Services declared in the spec, in build order
    pub fn enabled_services(&self) -> Vec<TemporalService> {
        let Some(services) = self.services.as_ref() else {
            return Vec::new();
        };
        TEMPORAL_SERVICES
            .into_iter()
            .filter(|s| services.get(*s).is_some())
            .collect()
    }

    /// Validate port assignments
    ///
    /// Every set port must be in `1..=65535`, and a service may not use the
    /// same port for more than one of rpc, membership and http.
    pub fn validate(&self, object: &str) -> Result<(), Error> {
        let Some(services) = self.services.as_ref() else {
            return Ok(());
        };

        for service in TEMPORAL_SERVICES {
            let Some(spec) = services.get(service) else {
                continue;
            };

            let ports = [
                ("port", spec.port),
                ("membershipPort", spec.membership_port),
                ("httpPort", spec.http_port),
            ];
            let mut seen: Vec<(&str, i32)> = Vec::with_capacity(ports.len());
            for (field, port) in ports {
                let Some(port) = port else { continue };
                if !(1..=65535).contains(&port) {
                    return Err(Error::validation(
                        object,
                        format!("services.{service}.{field} must be between 1 and 65535, got {port}"),
                    ));
                }
                if let Some((other, _)) = seen.iter().find(|(_, p)| *p == port) {
                    return Err(Error::validation(
                        object,
                        format!("services.{service}.{field} reuses port {port} already assigned to {other}"),
                    ));
                }
                seen.push((field, port));
            }

            if let Some(replicas) = spec.replicas {
                if replicas < 0 {
                    return Err(Error::validation(
                        object,
                        format!("services.{service}.replicas must not be negative, got {replicas}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Status for a TemporalCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemporalClusterStatus {
    /// Conditions representing the cluster state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Temporal version currently deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-service rollout state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceStatus>,
}

impl TemporalCluster {
    /// True iff the `Ready` condition is `True`
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| is_condition_true(&s.conditions, CONDITION_READY))
    }

    /// Name of a child object owned by this cluster (`<cluster>-<suffix>`)
    pub fn child_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.name_any(), suffix)
    }

    /// `namespace/name` key, used in logs and error messages
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}
