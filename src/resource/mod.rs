//! Desired-state builders for objects owned by a TemporalCluster
//!
//! Each builder describes one child object. [`ResourceBuilder::build`]
//! returns a bare skeleton (identity and metadata only), and
//! [`ResourceBuilder::update`] brings an observed object to the desired
//! shape. `update` is a pure function of the cluster spec and the observed
//! object, so applying it twice yields the same result as applying it once.
//!
//! Builders never delete anything. A builder whose [`ResourceBuilder::enabled`]
//! returns false tells [`apply_builders`] that its object should be absent.

mod admintools;
mod deployment;
mod frontend_service;
mod headless_service;
pub mod metadata;
mod ui;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

pub use admintools::AdminToolsDeploymentBuilder;
pub use deployment::ServiceDeploymentBuilder;
pub use frontend_service::FrontendServiceBuilder;
pub use headless_service::HeadlessServiceBuilder;
pub use ui::{UIDeploymentBuilder, UIServiceBuilder};

use crate::crd::{TemporalCluster, TemporalService, TEMPORAL_SERVICES};
use crate::store::ObjectStore;
use crate::Error;

/// Port the Temporal server exposes Prometheus metrics on
pub const METRICS_PORT: i32 = 9090;

/// Kinds of objects a TemporalCluster owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildKind {
    /// core/v1 Service
    Service,
    /// apps/v1 Deployment
    Deployment,
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => write!(f, "Service"),
            Self::Deployment => write!(f, "Deployment"),
        }
    }
}

/// A child object of a TemporalCluster
#[derive(Clone, Debug, PartialEq)]
pub enum ChildResource {
    /// A Service
    Service(Service),
    /// A Deployment
    Deployment(Deployment),
}

impl ChildResource {
    /// Kind of the wrapped object
    pub fn kind(&self) -> ChildKind {
        match self {
            Self::Service(_) => ChildKind::Service,
            Self::Deployment(_) => ChildKind::Deployment,
        }
    }

    /// Object metadata
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Service(s) => &s.metadata,
            Self::Deployment(d) => &d.metadata,
        }
    }

    /// Mutable object metadata
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Service(s) => &mut s.metadata,
            Self::Deployment(d) => &mut d.metadata,
        }
    }

    /// Object name (empty if unset)
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Object namespace (empty if unset)
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    /// `Kind/namespace/name`, used in error messages
    pub fn display_key(&self) -> String {
        format!("{}/{}/{}", self.kind(), self.namespace(), self.name())
    }

    /// The wrapped Deployment, if this is one
    pub fn as_deployment(&self) -> Option<&Deployment> {
        match self {
            Self::Deployment(d) => Some(d),
            Self::Service(_) => None,
        }
    }
}

/// Desired-state description of one child object
pub trait ResourceBuilder: Send + Sync {
    /// Bare skeleton: name, namespace, labels and annotations
    fn build(&self) -> ChildResource;

    /// Whether the object should exist at all
    fn enabled(&self) -> bool;

    /// Mutate an observed object into the desired shape
    fn update(&self, object: &mut ChildResource) -> Result<(), Error>;
}

/// Ordered builders for every object a cluster may own
pub fn cluster_builders(cluster: &TemporalCluster) -> Vec<Box<dyn ResourceBuilder + '_>> {
    let mut builders: Vec<Box<dyn ResourceBuilder + '_>> =
        vec![Box::new(FrontendServiceBuilder::new(cluster))];
    for service in TEMPORAL_SERVICES {
        builders.push(Box::new(HeadlessServiceBuilder::new(cluster, service)));
        builders.push(Box::new(ServiceDeploymentBuilder::new(cluster, service)));
    }
    builders.push(Box::new(UIDeploymentBuilder::new(cluster)));
    builders.push(Box::new(UIServiceBuilder::new(cluster)));
    builders.push(Box::new(AdminToolsDeploymentBuilder::new(cluster)));
    builders
}

/// Create, update or delete each builder's object, in order
///
/// Returns the objects observed after the pass for every enabled builder.
/// Disabled builders delete their object when it exists, tolerating a
/// concurrent removal. Objects that already match the desired shape are not
/// written.
pub async fn apply_builders(
    store: &dyn ObjectStore,
    builders: &[Box<dyn ResourceBuilder + '_>],
) -> Result<Vec<ChildResource>, Error> {
    let mut observed = Vec::with_capacity(builders.len());

    for builder in builders {
        let skeleton = builder.build();
        let kind = skeleton.kind();
        let namespace = skeleton.namespace().to_string();
        let name = skeleton.name().to_string();

        let current = store.get_child(kind, &namespace, &name).await?;
        if !builder.enabled() {
            if current.is_some() {
                store.delete_child(kind, &namespace, &name).await?;
                info!(%kind, %name, "deleted disabled child object");
            }
            continue;
        }

        match current {
            None => {
                let mut object = skeleton;
                builder.update(&mut object)?;
                let created = store.create_child(&object).await?;
                info!(%kind, %name, "created child object");
                observed.push(created);
            }
            Some(mut existing) => {
                let before = existing.clone();
                builder.update(&mut existing)?;
                if existing == before {
                    observed.push(existing);
                } else {
                    let replaced = store.replace_child(&existing).await?;
                    info!(%kind, %name, "updated child object");
                    observed.push(replaced);
                }
            }
        }
    }

    Ok(observed)
}

/// A port the defaults normalizer guarantees, or a builder error when it is unset
pub(crate) fn require_port(
    cluster: &TemporalCluster,
    service: TemporalService,
    field: &str,
    value: Option<i32>,
) -> Result<i32, Error> {
    value.ok_or_else(|| {
        Error::builder(
            cluster.child_name(service.as_str()),
            format!("services.{service}.{field} is not set"),
        )
    })
}

/// `host:port` of the cluster's frontend Service
pub(crate) fn frontend_address(cluster: &TemporalCluster) -> Result<String, Error> {
    let port = cluster
        .spec
        .services
        .as_ref()
        .and_then(|s| s.frontend.as_ref())
        .and_then(|f| f.port);
    let port = require_port(cluster, TemporalService::Frontend, "port", port)?;
    Ok(format!(
        "{}.{}:{}",
        cluster.child_name(TemporalService::Frontend.as_str()),
        kube::ResourceExt::namespace(cluster).unwrap_or_default(),
        port
    ))
}

/// `repository:tag`
pub(crate) fn image_ref(image: &str, tag: &str) -> String {
    format!("{image}:{tag}")
}
