//! Custom Resource Definitions for the Temporal operator
//!
//! Both kinds live in the `temporal.io/v1beta1` group and are namespaced.

mod cluster;
pub mod conditions;
mod namespace;
mod types;

pub use cluster::{TemporalCluster, TemporalClusterSpec, TemporalClusterStatus};
pub use namespace::{
    TemporalNamespace, TemporalNamespaceSpec, TemporalNamespaceStatus, DEFAULT_RETENTION,
    DELETION_FINALIZER,
};
pub use types::{
    AdminToolsSpec, CertificatesDurationSpec, ClusterReference, Condition, ConditionStatus,
    KubeDuration, MTLSSpec, PersistenceSpec, ServiceSpec, ServiceStatus, ServicesSpec,
    TemporalService, UISpec, CERT_MANAGER_PROVIDER, TEMPORAL_SERVICES,
};
