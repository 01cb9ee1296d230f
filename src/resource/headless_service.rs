//! Headless discovery Service per Temporal service
//!
//! Ringpop membership needs every pod address, ready or not, so these
//! services publish not-ready addresses and have no cluster IP.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::metadata;
use super::{require_port, ChildResource, ResourceBuilder, METRICS_PORT};
use crate::crd::{ServiceSpec as TemporalServiceSpec, TemporalCluster, TemporalService};
use crate::Error;

/// Headless Service (`<cluster>-<service>-headless`)
pub struct HeadlessServiceBuilder<'a> {
    cluster: &'a TemporalCluster,
    service: TemporalService,
}

impl<'a> HeadlessServiceBuilder<'a> {
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

    fn labels(&self) -> std::collections::BTreeMap<String, String> {
        metadata::merge(
            None,
            &[
                &metadata::labels(self.cluster, self.service.as_str(), &self.cluster.spec.version),
                &metadata::headless_labels(),
            ],
        )
    }
}

impl ResourceBuilder for HeadlessServiceBuilder<'_> {
    fn build(&self) -> ChildResource {
        ChildResource::Service(Service {
            metadata: ObjectMeta {
                name: Some(self.cluster.child_name(&format!("{}-headless", self.service))),
                namespace: self.cluster.namespace(),
                labels: Some(self.labels()),
                annotations: Some(metadata::annotations(self.cluster)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn enabled(&self) -> bool {
        self.settings().is_some()
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let service = match object {
            ChildResource::Service(service) => service,
            other => return Err(Error::builder(other.display_key(), "expected a Service")),
        };
        let settings = self.settings().cloned().unwrap_or_default();
        let rpc = require_port(self.cluster, self.service, "port", settings.port)?;
        let membership = require_port(
            self.cluster,
            self.service,
            "membershipPort",
            settings.membership_port,
        )?;

        service.metadata.labels = Some(metadata::merge(
            service.metadata.labels.as_ref(),
            &[&self.labels()],
        ));
        service.metadata.annotations = Some(metadata::merge(
            service.metadata.annotations.as_ref(),
            &[&metadata::annotations(self.cluster)],
        ));

        let spec = service.spec.get_or_insert_with(ServiceSpec::default);
        spec.type_ = Some("ClusterIP".to_string());
        spec.cluster_ip = Some("None".to_string());
        spec.publish_not_ready_addresses = Some(true);
        spec.selector = Some(metadata::selector(self.cluster, self.service.as_str()));
        // "tcp-" rather than "grpc-": pod-to-pod traffic has no Host header,
        // so meshes cannot apply gRPC-level mTLS to it
        spec.ports = Some(vec![
            ServicePort {
                name: Some("tcp-rpc".to_string()),
                protocol: Some("TCP".to_string()),
                port: rpc,
                target_port: Some(IntOrString::String("rpc".to_string())),
                ..Default::default()
            },
            ServicePort {
                name: Some("tcp-membership".to_string()),
                protocol: Some("TCP".to_string()),
                port: membership,
                target_port: Some(IntOrString::String("membership".to_string())),
                ..Default::default()
            },
            ServicePort {
                name: Some("http-metrics".to_string()),
                protocol: Some("TCP".to_string()),
                port: METRICS_PORT,
                target_port: Some(IntOrString::String("metrics".to_string())),
                ..Default::default()
            },
        ]);

        metadata::set_controller_reference(self.cluster, &mut service.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_support::defaulted_cluster;

    #[test]
    fn test_headless_service_shape() {
        let cluster = defaulted_cluster("prod");
        let builder = HeadlessServiceBuilder::new(&cluster, TemporalService::History);
        assert!(builder.enabled());

        let mut object = builder.build();
        assert_eq!(object.name(), "prod-history-headless");
        builder.update(&mut object).unwrap();

        let ChildResource::Service(service) = object else {
            panic!("expected a Service");
        };
        let labels = service.metadata.labels.clone().unwrap_or_default();
        assert_eq!(labels.get(metadata::LABEL_HEADLESS).map(String::as_str), Some("true"));

        let spec = service.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        let ports = spec.ports.unwrap();
        let names: Vec<_> = ports.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec!["tcp-rpc", "tcp-membership", "http-metrics"]);
        assert_eq!(ports[0].port, 7234);
        assert_eq!(ports[1].port, 6934);
        assert_eq!(ports[2].port, METRICS_PORT);
    }

    /// Story: A service absent from the spec has no headless Service
    #[test]
    fn story_absent_service_disables_builder() {
        let mut cluster = defaulted_cluster("prod");
        if let Some(services) = cluster.spec.services.as_mut() {
            services.worker = None;
        }
        assert!(!HeadlessServiceBuilder::new(&cluster, TemporalService::Worker).enabled());
        assert!(HeadlessServiceBuilder::new(&cluster, TemporalService::Matching).enabled());
    }

    #[test]
    fn test_update_twice_is_stable() {
        let cluster = defaulted_cluster("prod");
        let builder = HeadlessServiceBuilder::new(&cluster, TemporalService::Matching);
        let mut once = builder.build();
        builder.update(&mut once).unwrap();
        let mut twice = once.clone();
        builder.update(&mut twice).unwrap();
        assert_eq!(once, twice);
    }
}
