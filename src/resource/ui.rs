//! Temporal Web UI Deployment and Service

use k8s_openapi::api::core::v1::{ContainerPort, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::deployment::{deployment_skeleton, plain_env, prepare_deployment, set_env};
use super::metadata;
use super::{frontend_address, image_ref, ChildResource, ResourceBuilder};
use crate::crd::{TemporalCluster, UISpec};
use crate::Error;

/// Port the UI listens on
pub const UI_PORT: i32 = 8080;

const COMPONENT: &str = "ui";

fn ui_spec(cluster: &TemporalCluster) -> UISpec {
    cluster.spec.ui.clone().unwrap_or_default()
}

/// UI Deployment (`<cluster>-ui`)
pub struct UIDeploymentBuilder<'a> {
    cluster: &'a TemporalCluster,
}

impl<'a> UIDeploymentBuilder<'a> {
    /// Builder for the given cluster
    pub fn new(cluster: &'a TemporalCluster) -> Self {
        Self { cluster }
    }
}

impl ResourceBuilder for UIDeploymentBuilder<'_> {
    fn build(&self) -> ChildResource {
        deployment_skeleton(self.cluster, COMPONENT, &ui_spec(self.cluster).version)
    }

    fn enabled(&self) -> bool {
        self.cluster.spec.ui_enabled()
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let ui = ui_spec(self.cluster);
        let address = frontend_address(self.cluster)?;

        let container = prepare_deployment(object, self.cluster, COMPONENT, &ui.version, 1, COMPONENT)?;
        container.image = Some(image_ref(&ui.image, &ui.version));
        set_env(container, plain_env("TEMPORAL_ADDRESS", address));
        container.ports = Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: UI_PORT,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]);
        Ok(())
    }
}

/// UI Service (`<cluster>-ui`)
pub struct UIServiceBuilder<'a> {
    cluster: &'a TemporalCluster,
}

impl<'a> UIServiceBuilder<'a> {
    /// Builder for the given cluster
    pub fn new(cluster: &'a TemporalCluster) -> Self {
        Self { cluster }
    }
}

impl ResourceBuilder for UIServiceBuilder<'_> {
    fn build(&self) -> ChildResource {
        ChildResource::Service(Service {
            metadata: ObjectMeta {
                name: Some(self.cluster.child_name(COMPONENT)),
                namespace: self.cluster.namespace(),
                labels: Some(metadata::labels(
                    self.cluster,
                    COMPONENT,
                    &ui_spec(self.cluster).version,
                )),
                annotations: Some(metadata::annotations(self.cluster)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn enabled(&self) -> bool {
        self.cluster.spec.ui_enabled()
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let service = match object {
            ChildResource::Service(service) => service,
            other => return Err(Error::builder(other.display_key(), "expected a Service")),
        };
        let labels = metadata::labels(self.cluster, COMPONENT, &ui_spec(self.cluster).version);
        service.metadata.labels = Some(metadata::merge(service.metadata.labels.as_ref(), &[&labels]));
        service.metadata.annotations = Some(metadata::merge(
            service.metadata.annotations.as_ref(),
            &[&metadata::annotations(self.cluster)],
        ));

        let spec = service.spec.get_or_insert_with(ServiceSpec::default);
        spec.type_ = Some("ClusterIP".to_string());
        spec.selector = Some(metadata::selector(self.cluster, COMPONENT));
        spec.ports = Some(vec![ServicePort {
            name: Some("http".to_string()),
            protocol: Some("TCP".to_string()),
            port: UI_PORT,
            target_port: Some(IntOrString::String("http".to_string())),
            ..Default::default()
        }]);

        metadata::set_controller_reference(self.cluster, &mut service.metadata)
    }
}
