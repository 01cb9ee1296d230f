//! Admin tools pod for running `temporal` / `tctl` against the cluster

use super::deployment::{deployment_skeleton, plain_env, prepare_deployment, set_env};
use super::{frontend_address, image_ref, ChildResource, ResourceBuilder};
use crate::crd::TemporalCluster;
use crate::Error;

const COMPONENT: &str = "admintools";

/// Admin tools Deployment (`<cluster>-admintools`)
pub struct AdminToolsDeploymentBuilder<'a> {
    cluster: &'a TemporalCluster,
}

impl<'a> AdminToolsDeploymentBuilder<'a> {
    /// Builder for the given cluster
    pub fn new(cluster: &'a TemporalCluster) -> Self {
        Self { cluster }
    }
}

impl ResourceBuilder for AdminToolsDeploymentBuilder<'_> {
    fn build(&self) -> ChildResource {
        deployment_skeleton(self.cluster, COMPONENT, &self.cluster.spec.version)
    }

    fn enabled(&self) -> bool {
        self.cluster.spec.admintools_enabled()
    }

    fn update(&self, object: &mut ChildResource) -> Result<(), Error> {
        let image = self
            .cluster
            .spec
            .admintools
            .as_ref()
            .map(|a| a.image.clone())
            .unwrap_or_default();
        let address = frontend_address(self.cluster)?;
        let version = &self.cluster.spec.version;

        let container = prepare_deployment(object, self.cluster, COMPONENT, version, 1, COMPONENT)?;
        container.image = Some(image_ref(&image, version));
        set_env(container, plain_env("TEMPORAL_ADDRESS", address.clone()));
        set_env(container, plain_env("TEMPORAL_CLI_ADDRESS", address));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::deployment::env_map;
    use crate::resource::test_support::defaulted_cluster;

    #[test]
    fn test_admintools_follow_cluster_version() {
        let mut cluster = defaulted_cluster("prod");
        assert!(!AdminToolsDeploymentBuilder::new(&cluster).enabled());
        if let Some(tools) = cluster.spec.admintools.as_mut() {
            tools.enabled = true;
        }

        let builder = AdminToolsDeploymentBuilder::new(&cluster);
        assert!(builder.enabled());
        let mut object = builder.build();
        assert_eq!(object.name(), "prod-admintools");
        builder.update(&mut object).unwrap();

        let ChildResource::Deployment(deployment) = object else {
            panic!("expected a Deployment");
        };
        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("temporalio/admin-tools:1.23.0"));
        let env = env_map(container);
        assert_eq!(
            env.get("TEMPORAL_CLI_ADDRESS"),
            Some(&Some("prod-frontend.temporal:7233".to_string()))
        );
    }
}
