//! TemporalCluster reconciliation
//!
//! Normalizes the spec, converges the owned Services and Deployments, and
//! reports readiness through the `Ready` condition that TemporalNamespaces
//! gate on.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::{merge_persist, record_conditions, with_deadline, Context, HasStatus, Outcome, PatchHelper};
use crate::crd::conditions::{set_condition, CONDITION_READY, REASON_SERVICES_NOT_READY, REASON_SERVICES_READY};
use crate::crd::{Condition, ConditionStatus, ServiceStatus, TemporalCluster};
use crate::defaults::reconcile_defaults;
use crate::index::ObjectKey;
use crate::resource::{apply_builders, cluster_builders, ChildResource};
use crate::Error;

fn backoff_key(key: &ObjectKey) -> String {
    format!("TemporalCluster/{key}")
}

/// Reconcile a TemporalCluster
///
/// Deleting clusters are left alone; their children carry owner references
/// and are removed by garbage collection.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any(), namespace = %cluster.namespace().unwrap_or_default()))]
pub async fn reconcile_cluster(cluster: Arc<TemporalCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ObjectKey::of(cluster.as_ref());
    let Some(mut current) = ctx.store.get_cluster(&key.namespace, &key.name).await? else {
        debug!("cluster no longer exists");
        ctx.backoff.reset(&backoff_key(&key));
        return Ok(Action::await_change());
    };
    if current.metadata.deletion_timestamp.is_some() {
        debug!("cluster is being deleted");
        ctx.backoff.reset(&backoff_key(&key));
        return Ok(Action::await_change());
    }

    let helper = PatchHelper::snapshot(&current);
    let result = with_deadline(&ctx, &key, reconcile_pass(&mut current, &ctx)).await;
    record_conditions(&mut current, &result);

    let patch = helper.diff(&current);
    let persisted = if patch.is_empty() {
        Ok(())
    } else {
        ctx.store.patch_cluster(&key.namespace, &key.name, &patch).await
    };

    ctx.action_for(&backoff_key(&key), merge_persist(result, persisted))
}

async fn reconcile_pass(cluster: &mut TemporalCluster, ctx: &Context) -> Result<Outcome, Error> {
    if reconcile_defaults(&mut cluster.spec) {
        ctx.store.replace_cluster(cluster).await?;
        info!("persisted defaulted cluster spec");
        return Ok(Outcome::Finished);
    }

    cluster.spec.validate(&cluster.object_key())?;

    let observed = {
        let builders = cluster_builders(cluster);
        apply_builders(ctx.store.as_ref(), &builders).await?
    };

    let services = service_statuses(cluster, &observed);
    let ready = services.iter().all(|s| s.ready);
    let version = cluster.spec.version.clone();

    let status = cluster.status_mut();
    status.services = services;
    let condition = if ready {
        status.version = Some(version);
        Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            REASON_SERVICES_READY,
            "all services are ready",
        )
    } else {
        let pending: Vec<&str> = status
            .services
            .iter()
            .filter(|s| !s.ready)
            .map(|s| s.name.as_str())
            .collect();
        Condition::new(
            CONDITION_READY,
            ConditionStatus::False,
            REASON_SERVICES_NOT_READY,
            format!("waiting for {}", pending.join(", ")),
        )
    };
    if set_condition(&mut status.conditions, condition) {
        info!(ready, "cluster readiness changed");
    }

    Ok(Outcome::Success)
}

/// Rollout state of every enabled service's Deployment
///
/// A service is ready once its Deployment has observed the latest generation
/// and has at least the requested number of ready replicas.
fn service_statuses(cluster: &TemporalCluster, observed: &[ChildResource]) -> Vec<ServiceStatus> {
    cluster
        .spec
        .enabled_services()
        .into_iter()
        .map(|service| {
            let name = cluster.child_name(service.as_str());
            let desired = cluster
                .spec
                .services
                .as_ref()
                .and_then(|s| s.get(service))
                .and_then(|s| s.replicas)
                .unwrap_or(1);
            let ready = observed
                .iter()
                .filter_map(ChildResource::as_deployment)
                .find(|d| d.metadata.name.as_deref() == Some(name.as_str()))
                .is_some_and(|d| {
                    let status = d.status.clone().unwrap_or_default();
                    let generation = d.metadata.generation.unwrap_or(0);
                    status.observed_generation.unwrap_or(0) >= generation
                        && status.ready_replicas.unwrap_or(0) >= desired
                });
            ServiceStatus {
                name: service.to_string(),
                version: cluster.spec.version.clone(),
                ready,
            }
        })
        .collect()
}

/// Error policy for the TemporalCluster controller
///
/// Requeues with per-object exponential backoff; the history is cleared by
/// the next successful pass.
pub fn cluster_error_policy(cluster: Arc<TemporalCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        cluster = %cluster.name_any(),
        "reconciliation failed"
    );
    ctx.backoff_action(&backoff_key(&ObjectKey::of(cluster.as_ref())))
}
