//! Deployment running one Temporal server service

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use super::metadata;
use super::{image_ref, require_port, ChildResource, ResourceBuilder, METRICS_PORT};
use crate::crd::{ServiceSpec as TemporalServiceSpec, TemporalCluster, TemporalService};
use crate::Error;

/// Name of the server container inside service pods
pub const SERVER_CONTAINER: &str = "temporal";

/// Deployment for one logical service (`<cluster>-<service>`)
pub struct ServiceDeploymentBuilder<'a> {
    cluster: &'a TemporalCluster,
    service: TemporalService,
}

impl<'a> ServiceDeploymentBuilder<'a> {
    /// Builder for one logical service of the given cluster
    pub fn new(cluster: &'a TemporalCluster, service: TemporalService) -> Self {
        Self { cluster, service }
    }

    fn settings(&self) -> Option<&'a TemporalServiceSpec> {
        self.cluster
            .spec
            .services
            .as_ref()
            .and_then(|s| s.get(self.service))
    }

    fn container_ports(&self, settings: &TemporalServiceSpec) -> Result<Vec<ContainerPort>, Error> {
        let rpc = require_port(self.cluster, self.service, "port", settings.port)?;
        let membership = require_port(
            self.cluster,
            self.service,
            "membershipPort",
            settings.membership_port,
        )?;

        let mut ports = vec![
            tcp_port("rpc", rpc),
            tcp_port("membership", membership),
            tcp_port("metrics", METRICS_PORT),
        ];
        if self.service == TemporalService::Frontend {
            if let Some(http) = settings.http_port {
                ports.push(tcp_port("http", http));
            }
        }
        Ok(ports)
    }
}

impl ResourceBuilder for ServiceDeploymentBuilder<'_> {
    fn build(&self) -> ChildResource {
        deployment_skeleton(self.cluster, self.service.as_str(), &self.cluster.spec.version)
    }

    fn enabled(&self) -> bool {
        self.settings().is_some()
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let settings = self.settings().cloned().unwrap_or_default();
        let ports = self.container_ports(&settings)?;
        let replicas = settings.replicas.unwrap_or(1);
        let image = image_ref(&self.cluster.spec.image, &self.cluster.spec.version);

        let container = prepare_deployment(
            object,
            self.cluster,
            self.service.as_str(),
            &self.cluster.spec.version,
            replicas,
            SERVER_CONTAINER,
        )?;
        container.image = Some(image);
        set_env(container, plain_env("SERVICES", self.service.as_str()));
        set_env(
            container,
            EnvVar {
                name: "POD_IP".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        api_version: Some("v1".to_string()),
                        field_path: "status.podIP".to_string(),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        container.ports = Some(ports);
        Ok(())
    }
}

/// Skeleton Deployment named `<cluster>-<component>`
pub(crate) fn deployment_skeleton(
    cluster: &TemporalCluster,
    component: &str,
    version: &str,
) -> ChildResource {
    ChildResource::Deployment(Deployment {
        metadata: ObjectMeta {
            name: Some(cluster.child_name(component)),
            namespace: cluster.namespace(),
            labels: Some(metadata::labels(cluster, component, version)),
            annotations: Some(metadata::annotations(cluster)),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Apply the builder-owned Deployment fields and return the named container
///
/// Labels and annotations are merged, replicas and selector overwritten, and
/// the pod template gets the component labels. Other containers in the pod
/// are left alone.
pub(crate) fn prepare_deployment<'d>(
    object: &'d mut ChildResource,
    cluster: &TemporalCluster,
    component: &str,
    version: &str,
    replicas: i32,
    container_name: &str,
) -> Result<&'d mut Container, Error> {
    let deployment = match object {
        ChildResource::Deployment(deployment) => deployment,
        other => return Err(Error::builder(other.display_key(), "expected a Deployment")),
    };

    let labels = metadata::labels(cluster, component, version);
    deployment.metadata.labels = Some(metadata::merge(deployment.metadata.labels.as_ref(), &[&labels]));
    deployment.metadata.annotations = Some(metadata::merge(
        deployment.metadata.annotations.as_ref(),
        &[&metadata::annotations(cluster)],
    ));
    metadata::set_controller_reference(cluster, &mut deployment.metadata)?;

    let spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
    spec.replicas = Some(replicas);
    spec.selector = LabelSelector {
        match_labels: Some(metadata::selector(cluster, component)),
        ..Default::default()
    };

    let template_meta = spec.template.metadata.get_or_insert_with(ObjectMeta::default);
    template_meta.labels = Some(metadata::merge(template_meta.labels.as_ref(), &[&labels]));

    let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
    Ok(ensure_container(pod, container_name))
}

/// Find a container by name, appending an empty one if missing
pub(crate) fn ensure_container<'p>(pod: &'p mut PodSpec, name: &str) -> &'p mut Container {
    let index = match pod.containers.iter().position(|c| c.name == name) {
        Some(index) => index,
        None => {
            pod.containers.push(Container {
                name: name.to_string(),
                ..Default::default()
            });
            pod.containers.len() - 1
        }
    };
    &mut pod.containers[index]
}

/// Insert or replace an environment variable by name, keeping the others
pub(crate) fn set_env(container: &mut Container, var: EnvVar) {
    let env = container.env.get_or_insert_with(Vec::new);
    match env.iter_mut().find(|e| e.name == var.name) {
        Some(existing) => *existing = var,
        None => env.push(var),
    }
}

/// Literal environment variable
pub(crate) fn plain_env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn tcp_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// Environment of a container as a name to literal-value map
#[cfg(test)]
pub(crate) fn env_map(
    container: &Container,
) -> std::collections::BTreeMap<String, Option<String>> {
    container
        .env
        .iter()
        .flatten()
        .map(|e| (e.name.clone(), e.value.clone()))
        .collect()
}
