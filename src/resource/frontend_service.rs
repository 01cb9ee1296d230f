//! ClusterIP Service in front of the frontend pods

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::metadata;
use super::{require_port, ChildResource, ResourceBuilder};
use crate::crd::{TemporalCluster, TemporalService};
use crate::Error;

/// Routable frontend Service (`<cluster>-frontend`)
pub struct FrontendServiceBuilder<'a> {
    cluster: &'a TemporalCluster,
}

impl<'a> FrontendServiceBuilder<'a> {
    /// Builder for the given cluster
    pub fn new(cluster: &'a TemporalCluster) -> Self {
        Self { cluster }
    }

    fn component(&self) -> &'static str {
        TemporalService::Frontend.as_str()
    }
}

impl ResourceBuilder for FrontendServiceBuilder<'_> {
    fn build(&self) -> ChildResource {
        ChildResource::Service(Service {
            metadata: ObjectMeta {
                name: Some(self.cluster.child_name(self.component())),
                namespace: self.cluster.namespace(),
                labels: Some(metadata::labels(
                    self.cluster,
                    self.component(),
                    &self.cluster.spec.version,
                )),
                annotations: Some(metadata::annotations(self.cluster)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn enabled(&self) -> bool {
        true
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let service = match object {
            ChildResource::Service(service) => service,
            other => return Err(Error::builder(other.display_key(), "expected a Service")),
        };

        let frontend = self
            .cluster
            .spec
            .services
            .as_ref()
            .and_then(|s| s.frontend.clone())
            .unwrap_or_default();
        let port = require_port(self.cluster, TemporalService::Frontend, "port", frontend.port)?;

        let labels = metadata::labels(self.cluster, self.component(), &self.cluster.spec.version);
        let annotations = metadata::annotations(self.cluster);
        service.metadata.labels = Some(metadata::merge(service.metadata.labels.as_ref(), &[&labels]));
        service.metadata.annotations = Some(metadata::merge(
            service.metadata.annotations.as_ref(),
            &[&annotations],
        ));

        let mut ports = vec![ServicePort {
            name: Some("grpc-rpc".to_string()),
            protocol: Some("TCP".to_string()),
            port,
            target_port: Some(IntOrString::String("rpc".to_string())),
            ..Default::default()
        }];
        if let Some(http_port) = frontend.http_port {
            ports.push(ServicePort {
                name: Some("http".to_string()),
                protocol: Some("TCP".to_string()),
                port: http_port,
                target_port: Some(IntOrString::String("http".to_string())),
                ..Default::default()
            });
        }

        let spec = service.spec.get_or_insert_with(ServiceSpec::default);
        spec.type_ = Some("ClusterIP".to_string());
        spec.selector = Some(metadata::selector(self.cluster, self.component()));
        spec.ports = Some(ports);

        metadata::set_controller_reference(self.cluster, &mut service.metadata)
    }
}
